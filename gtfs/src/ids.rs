/// Declares a newtype around an identifier string taken verbatim from some input file.
#[macro_export]
macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Clone,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: Into<String>>(x: S) -> Self {
                Self(x.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(x: &str) -> Self {
                Self::new(x)
            }
        }
    };
}

string_id!(StopID);
string_id!(TripID);
// GTFS calls these routes. The road network side calls them lines.
string_id!(LineID);
