//! Knowledge graph: entities, relations, provenance, and storage

pub mod edge;
pub mod node;
pub mod provenance;
pub mod resolve;
pub mod store;
pub mod types;

pub use edge::RelationEdge;
pub use node::EntityNode;
pub use provenance::Provenance;
pub use resolve::{EntityResolver, ExactLabelResolver, NormalizingResolver};
pub use store::{GraphError, GraphResult, KnowledgeGraph, SubgraphView};
pub use types::{ChunkId, DocumentId, EdgeId, NodeId};
