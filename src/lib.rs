pub mod driver;
pub mod ir;
pub mod location_map;
pub mod parser;

pub use driver::Config;
pub use location_map::LocationMap;
