pub mod producer;
pub mod serializer;

pub use producer::KafkaProducer;
pub use serializer::{JsonSerializer, SerializationFormat};
