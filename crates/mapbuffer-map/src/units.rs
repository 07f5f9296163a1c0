macro_rules! def_units {
    ($t: ident, $unit: literal) => {
        #[doc = concat!("Denotes that the inner `T` is given in units of ", $unit, ".")]
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub struct $t<T>(pub T);

        impl<T> $t<T> {
            pub fn into_inner(self) -> T {
                self.0
            }
        }
    };
}

def_units!(TileUnits, "tiles");
def_units!(SubmapUnits, "submaps");
