//! Assembly of the frozen relationship model.
//!
//! [`Directory::build`] turns a [`Snapshot`] into four graph views over the
//! record arenas:
//!
//! - **entity**: biobanks and collections, every edge present in both directions
//! - **hierarchy**: biobank -> top-level collection -> sub-collection, acyclic,
//!   at most one parent per collection (taken from `parent_collection`)
//! - **contact**: every biobank, collection and network linked to its contact
//! - **network**: networks linked to their member biobanks and collections
//!
//! All nodes are inserted before any edge. One-directional edges in the
//! symmetric views are repaired with a warning; duplicate ids, dangling
//! references and hierarchy cycles abort the build.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{BiobankId, CollectionId, ContactId, EntityKind, GraphKind, NetworkId};
use crate::error::DirectoryError;
use crate::graph::{GraphNode, RelationGraph};
use crate::records::{Biobank, Collection, Contact, Fact, Network};
use crate::snapshot::Snapshot;

/// Number of reverse edges synthesised per symmetric graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub entity: usize,
    pub contact: usize,
    pub network: usize,
}

impl RepairReport {
    pub fn total(&self) -> usize {
        self.entity + self.contact + self.network
    }

    pub fn for_graph(&self, kind: GraphKind) -> usize {
        match kind {
            GraphKind::Entity => self.entity,
            GraphKind::Contact => self.contact,
            GraphKind::Network => self.network,
            GraphKind::Hierarchy => 0,
        }
    }
}

/// The reconciled, read-only catalog model.
#[derive(Debug, Clone)]
pub struct Directory {
    pub(crate) biobanks: Vec<Biobank>,
    pub(crate) collections: Vec<Collection>,
    pub(crate) contacts: Vec<Contact>,
    pub(crate) networks: Vec<Network>,
    pub(crate) facts: Vec<Fact>,
    pub(crate) biobank_index: HashMap<BiobankId, usize>,
    pub(crate) collection_index: HashMap<CollectionId, usize>,
    pub(crate) contact_index: HashMap<ContactId, usize>,
    pub(crate) network_index: HashMap<NetworkId, usize>,
    pub(crate) facts_by_collection: HashMap<CollectionId, Vec<usize>>,
    pub(crate) entity: RelationGraph,
    pub(crate) hierarchy: RelationGraph,
    pub(crate) contact: RelationGraph,
    pub(crate) network: RelationGraph,
    repairs: RepairReport,
}

impl Directory {
    pub fn build(snapshot: Snapshot) -> Result<Self, DirectoryError> {
        let Snapshot {
            biobanks,
            collections,
            contacts,
            networks,
            facts,
        } = snapshot;

        let mut entity = RelationGraph::new(GraphKind::Entity);
        let mut hierarchy = RelationGraph::new(GraphKind::Hierarchy);
        let mut contact = RelationGraph::new(GraphKind::Contact);
        let mut network = RelationGraph::new(GraphKind::Network);

        let mut biobank_index = HashMap::with_capacity(biobanks.len());
        for (slot, biobank) in biobanks.iter().enumerate() {
            let node = graph_node(EntityKind::Biobanks, biobank.id.as_str(), slot);
            for graph in [&mut entity, &mut hierarchy, &mut contact, &mut network] {
                graph.add_node(node.clone())?;
            }
            biobank_index.insert(biobank.id.clone(), slot);
        }

        let mut collection_index = HashMap::with_capacity(collections.len());
        for (slot, collection) in collections.iter().enumerate() {
            let node = graph_node(EntityKind::Collections, collection.id.as_str(), slot);
            for graph in [&mut entity, &mut hierarchy, &mut contact, &mut network] {
                graph.add_node(node.clone())?;
            }
            collection_index.insert(collection.id.clone(), slot);
        }

        let mut contact_index = HashMap::with_capacity(contacts.len());
        for (slot, person) in contacts.iter().enumerate() {
            contact.add_node(graph_node(EntityKind::Contacts, person.id.as_str(), slot))?;
            contact_index.insert(person.id.clone(), slot);
        }

        let mut network_index = HashMap::with_capacity(networks.len());
        for (slot, net) in networks.iter().enumerate() {
            let node = graph_node(EntityKind::Networks, net.id.as_str(), slot);
            contact.add_node(node.clone())?;
            network.add_node(node)?;
            network_index.insert(net.id.clone(), slot);
        }

        for biobank in &biobanks {
            debug!(biobank = %biobank.id, "linking biobank");
            let id = biobank.id.as_str();
            for collection in &biobank.collections {
                if !collection_index.contains_key(collection) {
                    return Err(DirectoryError::DanglingReference {
                        graph: GraphKind::Entity,
                        from: id.to_string(),
                        to: collection.to_string(),
                    });
                }
            }
            if let Some(person) = &biobank.contact {
                contact.add_edge(id, person.as_str())?;
            }
            for net in &biobank.networks {
                network.add_edge(id, net.as_str())?;
            }
        }

        for collection in &collections {
            debug!(collection = %collection.id, "linking collection");
            let id = collection.id.as_str();
            if !biobank_index.contains_key(&collection.biobank) {
                return Err(DirectoryError::DanglingReference {
                    graph: GraphKind::Entity,
                    from: id.to_string(),
                    to: collection.biobank.to_string(),
                });
            }
            match &collection.parent_collection {
                Some(parent) => {
                    hierarchy.add_edge(parent.as_str(), id)?;
                    entity.add_edge_pair(id, parent.as_str())?;
                }
                None => {
                    hierarchy.add_edge(collection.biobank.as_str(), id)?;
                    entity.add_edge_pair(id, collection.biobank.as_str())?;
                }
            }
            // Sub-collection lists mirror `parent_collection` and add no edges.
            for sub in &collection.sub_collections {
                let Some(slot) = collection_index.get(sub) else {
                    return Err(DirectoryError::DanglingReference {
                        graph: GraphKind::Hierarchy,
                        from: id.to_string(),
                        to: sub.to_string(),
                    });
                };
                let parent = collections[*slot].parent_collection.as_ref();
                if parent != Some(&collection.id) {
                    return Err(DirectoryError::ConflictingParent {
                        id: sub.to_string(),
                        parent: parent.map(|p| p.to_string()),
                        listed_by: id.to_string(),
                    });
                }
            }
            if let Some(person) = &collection.contact {
                contact.add_edge(id, person.as_str())?;
            }
            for net in &collection.networks {
                network.add_edge(id, net.as_str())?;
            }
        }

        for person in &contacts {
            debug!(contact = %person.id, "linking contact");
            let id = person.id.as_str();
            let linked = person
                .biobanks
                .iter()
                .map(BiobankId::as_str)
                .chain(person.collections.iter().map(CollectionId::as_str))
                .chain(person.networks.iter().map(NetworkId::as_str));
            for target in linked {
                contact.add_edge(id, target)?;
            }
        }

        for net in &networks {
            debug!(network = %net.id, "linking network");
            let id = net.id.as_str();
            if let Some(person) = &net.contact {
                contact.add_edge(id, person.as_str())?;
            }
            let members = net
                .biobanks
                .iter()
                .map(BiobankId::as_str)
                .chain(net.collections.iter().map(CollectionId::as_str));
            for member in members {
                network.add_edge(id, member)?;
            }
        }

        let mut facts_by_collection: HashMap<CollectionId, Vec<usize>> = HashMap::new();
        for (slot, fact) in facts.iter().enumerate() {
            if !collection_index.contains_key(&fact.collection) {
                return Err(DirectoryError::DanglingReference {
                    graph: GraphKind::Entity,
                    from: fact.id.clone(),
                    to: fact.collection.to_string(),
                });
            }
            facts_by_collection
                .entry(fact.collection.clone())
                .or_default()
                .push(slot);
        }

        let repairs = RepairReport {
            entity: entity.repair_symmetry()?,
            contact: contact.repair_symmetry()?,
            network: network.repair_symmetry()?,
        };
        if repairs.total() > 0 {
            info!(
                entity = repairs.entity,
                contact = repairs.contact,
                network = repairs.network,
                "repaired one-directional edges"
            );
        }

        if let Some(id) = hierarchy.find_cycle() {
            return Err(DirectoryError::HierarchyCycle { id });
        }

        for graph in [&mut entity, &mut hierarchy, &mut contact, &mut network] {
            graph.freeze();
        }

        info!(
            biobanks = biobanks.len(),
            collections = collections.len(),
            contacts = contacts.len(),
            networks = networks.len(),
            facts = facts.len(),
            "directory model built"
        );

        Ok(Self {
            biobanks,
            collections,
            contacts,
            networks,
            facts,
            biobank_index,
            collection_index,
            contact_index,
            network_index,
            facts_by_collection,
            entity,
            hierarchy,
            contact,
            network,
            repairs,
        })
    }

    pub fn repairs(&self) -> RepairReport {
        self.repairs
    }

    pub fn graph(&self, kind: GraphKind) -> &RelationGraph {
        match kind {
            GraphKind::Entity => &self.entity,
            GraphKind::Hierarchy => &self.hierarchy,
            GraphKind::Contact => &self.contact,
            GraphKind::Network => &self.network,
        }
    }

    pub fn biobanks(&self) -> &[Biobank] {
        &self.biobanks
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn networks(&self) -> &[Network] {
        &self.networks
    }

    pub fn facts(&self) -> &[Fact] {
        &self.facts
    }

    pub fn biobanks_count(&self) -> usize {
        self.biobanks.len()
    }

    pub fn collections_count(&self) -> usize {
        self.collections.len()
    }

    pub fn contacts_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn networks_count(&self) -> usize {
        self.networks.len()
    }

    pub fn facts_count(&self) -> usize {
        self.facts.len()
    }

    /// Fact rows recorded for a collection, in snapshot order.
    pub fn facts_for(&self, id: &CollectionId) -> Vec<&Fact> {
        self.facts_by_collection
            .get(id)
            .map(|slots| slots.iter().map(|slot| &self.facts[*slot]).collect())
            .unwrap_or_default()
    }
}

fn graph_node(kind: EntityKind, id: &str, slot: usize) -> GraphNode {
    GraphNode {
        id: id.to_string(),
        kind,
        slot,
    }
}
