use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::hash::Hash;
use std::iter;

use petgraph::Direction;
use serde::Serialize;
use tracing::warn;

use crate::directory::Directory;
use crate::domain::{
    BiobankId, CollectionId, ContactId, CountryCode, EU_NATIONAL_NODE, EntityKind, Lookup, Metric,
    NetworkId, staging_area,
};
use crate::error::DirectoryError;
use crate::graph::Subgraph;
use crate::records::{Biobank, Collection, Contact, Network};

#[derive(Debug, Clone, Serialize)]
pub struct NetworkMembers<'a> {
    pub biobanks: Vec<&'a Biobank>,
    pub collections: Vec<&'a Collection>,
}

fn find<'a, K, T>(
    index: &HashMap<K, usize>,
    arena: &'a [T],
    kind: EntityKind,
    id: &K,
    lookup: Lookup,
) -> Result<Option<&'a T>, DirectoryError>
where
    K: Eq + Hash + Display,
{
    match index.get(id) {
        Some(slot) => Ok(Some(&arena[*slot])),
        None => match lookup {
            Lookup::Lenient => {
                warn!(kind = %kind, id = %id, "record not found");
                Ok(None)
            }
            Lookup::Strict => Err(DirectoryError::NotFound {
                kind,
                id: id.to_string(),
            }),
        },
    }
}

fn strict<T>(
    found: Result<Option<T>, DirectoryError>,
    kind: EntityKind,
    id: &str,
) -> Result<T, DirectoryError> {
    found?.ok_or_else(|| DirectoryError::NotFound {
        kind,
        id: id.to_string(),
    })
}

impl Directory {
    pub fn biobank_by_id(
        &self,
        id: &BiobankId,
        lookup: Lookup,
    ) -> Result<Option<&Biobank>, DirectoryError> {
        find(&self.biobank_index, &self.biobanks, EntityKind::Biobanks, id, lookup)
    }

    pub fn collection_by_id(
        &self,
        id: &CollectionId,
        lookup: Lookup,
    ) -> Result<Option<&Collection>, DirectoryError> {
        find(
            &self.collection_index,
            &self.collections,
            EntityKind::Collections,
            id,
            lookup,
        )
    }

    pub fn contact_by_id(
        &self,
        id: &ContactId,
        lookup: Lookup,
    ) -> Result<Option<&Contact>, DirectoryError> {
        find(&self.contact_index, &self.contacts, EntityKind::Contacts, id, lookup)
    }

    pub fn network_by_id(
        &self,
        id: &NetworkId,
        lookup: Lookup,
    ) -> Result<Option<&Network>, DirectoryError> {
        find(&self.network_index, &self.networks, EntityKind::Networks, id, lookup)
    }

    fn biobank(&self, id: &BiobankId) -> Result<&Biobank, DirectoryError> {
        strict(
            self.biobank_by_id(id, Lookup::Strict),
            EntityKind::Biobanks,
            id.as_str(),
        )
    }

    fn collection(&self, id: &CollectionId) -> Result<&Collection, DirectoryError> {
        strict(
            self.collection_by_id(id, Lookup::Strict),
            EntityKind::Collections,
            id.as_str(),
        )
    }

    fn network(&self, id: &NetworkId) -> Result<&Network, DirectoryError> {
        strict(
            self.network_by_id(id, Lookup::Strict),
            EntityKind::Networks,
            id.as_str(),
        )
    }

    /// The biobank and all its collections, with the hierarchy edges between them.
    ///
    /// A biobank without collections yields a single node and no edges.
    pub fn biobank_subgraph(&self, id: &BiobankId) -> Result<Subgraph, DirectoryError> {
        self.biobank(id)?;
        let below = self.hierarchy.reachable(id.as_str(), Direction::Outgoing);
        Ok(self
            .hierarchy
            .induced(iter::once(id.as_str()).chain(below.iter().map(|n| n.id.as_str()))))
    }

    /// The collection with every ancestor (up to its biobank) and every descendant.
    ///
    /// A collection whose subgraph holds no edges is not attached to any biobank.
    pub fn collection_subgraph(&self, id: &CollectionId) -> Result<Subgraph, DirectoryError> {
        self.collection(id)?;
        let above = self.hierarchy.reachable(id.as_str(), Direction::Incoming);
        let below = self.hierarchy.reachable(id.as_str(), Direction::Outgoing);
        let members = iter::once(id.as_str())
            .chain(above.iter().map(|n| n.id.as_str()))
            .chain(below.iter().map(|n| n.id.as_str()));
        Ok(self.hierarchy.induced(members))
    }

    pub fn descendants(&self, id: &CollectionId) -> Result<BTreeSet<CollectionId>, DirectoryError> {
        self.collection(id)?;
        Ok(self
            .hierarchy
            .reachable(id.as_str(), Direction::Outgoing)
            .into_iter()
            .filter(|node| node.kind == EntityKind::Collections)
            .map(|node| self.collections[node.slot].id.clone())
            .collect())
    }

    /// Collections above `id` in the hierarchy; the owning biobank is not included.
    pub fn ancestors(&self, id: &CollectionId) -> Result<BTreeSet<CollectionId>, DirectoryError> {
        Ok(self
            .collection_ancestor_chain(id)?
            .into_iter()
            .map(|collection| collection.id.clone())
            .collect())
    }

    /// Parent, grandparent, ... up to the top-level collection, nearest first.
    pub fn collection_ancestor_chain(
        &self,
        id: &CollectionId,
    ) -> Result<Vec<&Collection>, DirectoryError> {
        let mut chain = Vec::new();
        let mut current = self.collection(id)?;
        while let Some(parent) = &current.parent_collection {
            current = self.collection(parent)?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// Whether the collection's own `metric` may be summed into a total.
    ///
    /// False as soon as a collection up the parent chain reports the same
    /// metric as an exact integer, since that figure already covers this
    /// collection. Order of magnitude estimates never block counting.
    pub fn is_countable(&self, id: &CollectionId, metric: Metric) -> Result<bool, DirectoryError> {
        let covered = self
            .collection_ancestor_chain(id)?
            .into_iter()
            .any(|ancestor| ancestor.count(metric).is_some());
        Ok(!covered)
    }

    pub fn is_countable_by_name(
        &self,
        id: &CollectionId,
        metric: &str,
    ) -> Result<bool, DirectoryError> {
        let metric: Metric = metric.parse()?;
        self.is_countable(id, metric)
    }

    pub fn collection_biobank_id(&self, id: &CollectionId) -> Result<&BiobankId, DirectoryError> {
        Ok(&self.collection(id)?.biobank)
    }

    pub fn is_top_level_collection(&self, id: &CollectionId) -> Result<bool, DirectoryError> {
        Ok(self.collection(id)?.is_top_level())
    }

    /// Every collection held by the biobank, at any depth, ordered by id.
    pub fn biobank_collections(&self, id: &BiobankId) -> Result<Vec<&Collection>, DirectoryError> {
        self.biobank(id)?;
        let mut collections = self
            .hierarchy
            .reachable(id.as_str(), Direction::Outgoing)
            .into_iter()
            .filter(|node| node.kind == EntityKind::Collections)
            .map(|node| &self.collections[node.slot])
            .collect::<Vec<_>>();
        collections.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(collections)
    }

    pub fn biobank_national_node(&self, id: &BiobankId) -> Result<CountryCode, DirectoryError> {
        Ok(self.biobank(id)?.country.clone())
    }

    pub fn collection_national_node(&self, id: &CollectionId) -> Result<CountryCode, DirectoryError> {
        let biobank = self.collection_biobank_id(id)?;
        self.biobank_national_node(biobank)
    }

    /// The network's own country, else its contact's country, else `EU`.
    pub fn network_national_node(&self, id: &NetworkId) -> Result<CountryCode, DirectoryError> {
        let network = self.network(id)?;
        if let Some(country) = &network.country {
            return Ok(country.clone());
        }
        let contact_country = match &network.contact {
            Some(contact) => self
                .contact_by_id(contact, Lookup::Lenient)?
                .and_then(|contact| contact.country.clone()),
            None => None,
        };
        Ok(contact_country.unwrap_or_else(|| CountryCode::from(EU_NATIONAL_NODE)))
    }

    pub fn contact_national_node(&self, id: &ContactId) -> Result<CountryCode, DirectoryError> {
        let contact = strict(
            self.contact_by_id(id, Lookup::Strict),
            EntityKind::Contacts,
            id.as_str(),
        )?;
        Ok(contact
            .country
            .clone()
            .or_else(|| staging_area(id.as_str()))
            .unwrap_or_else(|| CountryCode::from(EU_NATIONAL_NODE)))
    }

    /// National node of any record id, dispatching on the record kind.
    ///
    /// Ids that are not in the model fall back to their staging-area prefix.
    pub fn national_node(&self, id: &str) -> Result<Option<CountryCode>, DirectoryError> {
        let Some(node) = self.contact.node(id) else {
            return Ok(staging_area(id));
        };
        let country = match node.kind {
            EntityKind::Biobanks => self.biobanks[node.slot].country.clone(),
            EntityKind::Collections => {
                self.collection_national_node(&self.collections[node.slot].id)?
            }
            EntityKind::Contacts => self.contact_national_node(&self.contacts[node.slot].id)?,
            EntityKind::Networks => self.network_national_node(&self.networks[node.slot].id)?,
            EntityKind::Facts => return Ok(None),
        };
        Ok(Some(country))
    }

    /// Contacts linked to a biobank, collection or network.
    pub fn contacts_of(&self, id: &str) -> Vec<&Contact> {
        self.contact
            .neighbors(id, Direction::Outgoing)
            .into_iter()
            .filter(|node| node.kind == EntityKind::Contacts)
            .map(|node| &self.contacts[node.slot])
            .collect()
    }

    /// Networks a biobank or collection belongs to.
    pub fn networks_of(&self, id: &str) -> Vec<&Network> {
        self.network
            .neighbors(id, Direction::Outgoing)
            .into_iter()
            .filter(|node| node.kind == EntityKind::Networks)
            .map(|node| &self.networks[node.slot])
            .collect()
    }

    pub fn network_members(&self, id: &NetworkId) -> Result<NetworkMembers<'_>, DirectoryError> {
        self.network(id)?;
        let mut members = NetworkMembers {
            biobanks: Vec::new(),
            collections: Vec::new(),
        };
        for node in self.network.neighbors(id.as_str(), Direction::Outgoing) {
            match node.kind {
                EntityKind::Biobanks => members.biobanks.push(&self.biobanks[node.slot]),
                EntityKind::Collections => members.collections.push(&self.collections[node.slot]),
                _ => {}
            }
        }
        Ok(members)
    }
}
