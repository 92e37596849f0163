mod dataset;
mod error;
mod hvo;
mod midi_importer;
mod midi_writer;
mod model;
mod partition;
mod pipeline;
mod rng;
mod serializer;
mod util;

pub use dataset::*;
pub use error::*;
pub use hvo::*;
pub use midi_importer::*;
pub use midi_writer::*;
pub use model::config::*;
pub use model::mappings::*;
pub use model::sequence::*;
pub use partition::*;
pub use pipeline::*;
pub use rng::*;
pub use serializer::*;
pub use util::*;
