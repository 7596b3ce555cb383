mod path;


pub use path::{PathSanitizer, lexical_normalize, normalize_native};
