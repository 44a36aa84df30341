//! stixgraph-graph — the graph store sink for the threat knowledge graph.
//!
//! Analysis results leave the process through this crate only. The
//! [`GraphSink`] contract is implemented by [`GraphClient`] (Memgraph or Neo4j
//! over Bolt) and by [`MemorySink`], an in-process store used by tests and
//! dry runs. Nodes and edges are keyed by their STIX ids, never by the
//! run-local node index.
//!
//! `clear()` wipes every `MitreObject` node, so two runs exporting into the
//! same store at the same time will destroy each other's output.

pub mod client;
pub mod memory;
pub mod mutations;
pub mod queries;
pub mod sink;

pub use client::{GraphClient, GraphConfig, GraphError};
pub use memory::MemorySink;
pub use queries::{AnalyticQuery, QueryRow};
pub use sink::{GraphSink, SinkEdge, SinkNode};
