pub mod errors;
pub mod limits;
pub mod record;
pub mod settings;
pub mod space;

pub use errors::*;
pub use limits::*;
pub use record::*;
pub use settings::*;
pub use space::*;
