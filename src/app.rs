use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::directory::{Directory, RepairReport};
use crate::domain::{BiobankId, CollectionId, EntityKind, GraphKind};
use crate::error::DirectoryError;
use crate::snapshot::{CatalogSource, FetchItem, SnapshotFetcher};
use crate::store::SnapshotCache;

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub purge: BTreeSet<EntityKind>,
}

#[derive(Debug, Clone)]
pub struct LoadResult {
    pub directory: Directory,
    pub fetched: Vec<FetchItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EntityCounts {
    pub biobanks: usize,
    pub collections: usize,
    pub contacts: usize,
    pub networks: usize,
    pub facts: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphSummary {
    pub graph: GraphKind,
    pub nodes: usize,
    pub edges: usize,
    pub repaired: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub entities: EntityCounts,
    pub withdrawn_biobanks: usize,
    pub withdrawn_collections: usize,
    pub graphs: Vec<GraphSummary>,
    pub repairs: RepairReport,
    pub fetched: Vec<FetchItem>,
}

#[derive(Debug, Clone)]
pub enum Query {
    NationalNode(String),
    Descendants(String),
    Subgraph(String),
    Countable { id: String, metric: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum QueryResult {
    NationalNode {
        id: String,
        national_node: Option<String>,
    },
    Descendants {
        id: String,
        descendants: Vec<String>,
    },
    Subgraph {
        id: String,
        nodes: Vec<String>,
        edges: Vec<(String, String)>,
    },
    Countable {
        id: String,
        metric: String,
        countable: bool,
    },
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<S: CatalogSource> {
    fetcher: SnapshotFetcher<S>,
}

impl<S: CatalogSource> App<S> {
    pub fn new(source: S, cache: Option<SnapshotCache>) -> Self {
        Self {
            fetcher: SnapshotFetcher::new(source, cache),
        }
    }

    pub fn load(
        &self,
        options: &LoadOptions,
        sink: &dyn ProgressSink,
    ) -> Result<LoadResult, DirectoryError> {
        sink.event(ProgressEvent {
            message: "phase=Fetch; reading catalog snapshot".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let fetched = self.fetcher.fetch(&options.purge)?;
        sink.event(ProgressEvent {
            message: format!("phase=Fetch; {} record lists", fetched.items.len()),
            elapsed: Some(start.elapsed()),
        });

        sink.event(ProgressEvent {
            message: "phase=Assemble; building relationship model".to_string(),
            elapsed: None,
        });
        let start = Instant::now();
        let directory = Directory::build(fetched.snapshot)?;
        sink.event(ProgressEvent {
            message: format!(
                "phase=Verify; repaired {} one-directional edges",
                directory.repairs().total()
            ),
            elapsed: Some(start.elapsed()),
        });

        Ok(LoadResult {
            directory,
            fetched: fetched.items,
        })
    }
}

pub fn summarize(result: &LoadResult) -> ModelSummary {
    let directory = &result.directory;
    let repairs = directory.repairs();
    ModelSummary {
        entities: EntityCounts {
            biobanks: directory.biobanks_count(),
            collections: directory.collections_count(),
            contacts: directory.contacts_count(),
            networks: directory.networks_count(),
            facts: directory.facts_count(),
        },
        withdrawn_biobanks: directory.biobanks().iter().filter(|b| b.withdrawn).count(),
        withdrawn_collections: directory
            .collections()
            .iter()
            .filter(|c| c.withdrawn)
            .count(),
        graphs: GraphKind::ALL
            .into_iter()
            .map(|kind| directory.graph(kind))
            .map(|graph| GraphSummary {
                graph: graph.kind(),
                nodes: graph.node_count(),
                edges: graph.edge_count(),
                repaired: repairs.for_graph(graph.kind()),
            })
            .collect(),
        repairs,
        fetched: result.fetched.clone(),
    }
}

pub fn run_query(directory: &Directory, query: &Query) -> Result<QueryResult, DirectoryError> {
    match query {
        Query::NationalNode(id) => Ok(QueryResult::NationalNode {
            id: id.clone(),
            national_node: directory.national_node(id)?.map(|code| code.to_string()),
        }),
        Query::Descendants(id) => {
            let descendants = directory.descendants(&CollectionId::from(id.as_str()))?;
            Ok(QueryResult::Descendants {
                id: id.clone(),
                descendants: descendants.into_iter().map(|c| c.to_string()).collect(),
            })
        }
        Query::Subgraph(id) => {
            let kind = directory
                .graph(GraphKind::Hierarchy)
                .node(id)
                .map(|node| node.kind);
            let subgraph = match kind {
                Some(EntityKind::Biobanks) => {
                    directory.biobank_subgraph(&BiobankId::from(id.as_str()))?
                }
                _ => directory.collection_subgraph(&CollectionId::from(id.as_str()))?,
            };
            Ok(QueryResult::Subgraph {
                id: id.clone(),
                nodes: subgraph.nodes,
                edges: subgraph.edges,
            })
        }
        Query::Countable { id, metric } => {
            let countable =
                directory.is_countable_by_name(&CollectionId::from(id.as_str()), metric)?;
            Ok(QueryResult::Countable {
                id: id.clone(),
                metric: metric.clone(),
                countable,
            })
        }
    }
}
