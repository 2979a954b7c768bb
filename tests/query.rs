use std::collections::BTreeSet;

use assert_matches::assert_matches;
use serde_json::{Value, json};

use kira_biobank_directory::directory::Directory;
use kira_biobank_directory::domain::{
    BiobankId, CollectionId, ContactId, CountryCode, EntityKind, Lookup, Metric, NetworkId,
};
use kira_biobank_directory::error::DirectoryError;
use kira_biobank_directory::snapshot::{Snapshot, parse_records};

mod common;

use common::capture_logs;

fn build(
    biobanks: Vec<Value>,
    collections: Vec<Value>,
    contacts: Vec<Value>,
    networks: Vec<Value>,
) -> Directory {
    let snapshot = Snapshot {
        biobanks: parse_records(EntityKind::Biobanks, biobanks).unwrap(),
        collections: parse_records(EntityKind::Collections, collections).unwrap(),
        contacts: parse_records(EntityKind::Contacts, contacts).unwrap(),
        networks: parse_records(EntityKind::Networks, networks).unwrap(),
        facts: Vec::new(),
    };
    Directory::build(snapshot).unwrap()
}

fn cid(id: &str) -> CollectionId {
    CollectionId::from(id)
}

/// BB1 -> C1 -> C2 with an optional size on C1.
fn two_level(parent_size: Option<u64>) -> Directory {
    let mut c1 = json!({"id": "C1", "biobank": "BB1"});
    if let Some(size) = parent_size {
        c1["size"] = json!(size);
    }
    build(
        vec![json!({"id": "BB1", "country": "FI"})],
        vec![
            c1,
            json!({"id": "C2", "biobank": "BB1", "parent_collection": "C1", "size": 5}),
        ],
        Vec::new(),
        Vec::new(),
    )
}

/// BB1 -> C0 -> C1 -> ... -> Cn, with `sizes[i]` on `Ci`.
fn chain(sizes: &[Option<Value>]) -> Directory {
    let collections = sizes
        .iter()
        .enumerate()
        .map(|(i, size)| {
            let mut record = json!({"id": format!("C{i}"), "biobank": "BB1"});
            if i > 0 {
                record["parent_collection"] = json!(format!("C{}", i - 1));
            }
            if let Some(size) = size {
                record["size"] = size.clone();
                record["number_of_donors"] = size.clone();
            }
            record
        })
        .collect();
    build(
        vec![json!({"id": "BB1", "country": "FI"})],
        collections,
        Vec::new(),
        Vec::new(),
    )
}

fn tree() -> Directory {
    build(
        vec![
            json!({"id": "BB1", "country": {"id": "SE"}}),
            json!({"id": "BB_EMPTY", "country": {"id": "SE"}}),
        ],
        vec![
            json!({"id": "ROOT", "biobank": "BB1", "order_of_magnitude": 6}),
            json!({"id": "MID", "biobank": "BB1", "parent_collection": "ROOT"}),
            json!({"id": "LEAF1", "biobank": "BB1", "parent_collection": "MID"}),
            json!({"id": "LEAF2", "biobank": "BB1", "parent_collection": "MID"}),
            json!({"id": "SIDE", "biobank": "BB1", "parent_collection": "ROOT"}),
            json!({"id": "OTHER_ROOT", "biobank": "BB1"}),
        ],
        Vec::new(),
        Vec::new(),
    )
}

#[test]
fn descendants_are_transitive_and_irreflexive() {
    let directory = tree();
    for collection in directory.collections() {
        let below = directory.descendants(&collection.id).unwrap();
        assert!(!below.contains(&collection.id));
        for child in &below {
            for grandchild in directory.descendants(child).unwrap() {
                assert!(below.contains(&grandchild));
            }
        }
    }
    assert_eq!(
        directory.descendants(&cid("ROOT")).unwrap(),
        BTreeSet::from([cid("MID"), cid("LEAF1"), cid("LEAF2"), cid("SIDE")])
    );
    assert!(directory.descendants(&cid("LEAF1")).unwrap().is_empty());
}

#[test]
fn ancestors_stop_below_biobank() {
    let directory = tree();
    assert_eq!(
        directory.ancestors(&cid("LEAF2")).unwrap(),
        BTreeSet::from([cid("MID"), cid("ROOT")])
    );
    assert!(directory.ancestors(&cid("ROOT")).unwrap().is_empty());

    let chain = directory
        .collection_ancestor_chain(&cid("LEAF1"))
        .unwrap()
        .into_iter()
        .map(|c| c.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(chain, vec!["MID", "ROOT"]);
}

#[test]
fn countable_until_parent_reports_size() {
    let directory = two_level(None);
    assert!(directory.is_countable(&cid("C2"), Metric::Size).unwrap());
    assert!(directory.is_countable(&cid("C1"), Metric::Size).unwrap());

    let directory = two_level(Some(50));
    assert!(!directory.is_countable(&cid("C2"), Metric::Size).unwrap());
    assert!(directory.is_countable(&cid("C1"), Metric::Size).unwrap());
    assert!(
        directory
            .is_countable(&cid("C2"), Metric::NumberOfDonors)
            .unwrap()
    );
}

#[test]
fn countable_over_any_chain_length() {
    for depth in 1..=4 {
        let mut sizes = vec![Some(json!(100))];
        sizes.extend((0..depth).map(|_| None));
        let directory = chain(&sizes);
        let leaf = cid(&format!("C{depth}"));
        assert!(!directory.is_countable(&leaf, Metric::Size).unwrap());
        assert!(!directory.is_countable(&leaf, Metric::NumberOfDonors).unwrap());

        let mut sizes = vec![None; depth + 1];
        sizes[depth] = Some(json!(7));
        let directory = chain(&sizes);
        assert!(directory.is_countable(&leaf, Metric::Size).unwrap());
    }
}

#[test]
fn negative_integer_size_still_blocks_counting() {
    let directory = chain(&[Some(json!(-1)), None]);
    assert!(!directory.is_countable(&cid("C1"), Metric::Size).unwrap());
}

#[test]
fn non_integer_sizes_do_not_block_counting() {
    let directory = chain(&[Some(json!("100")), Some(json!(2.5)), None]);
    assert!(directory.is_countable(&cid("C2"), Metric::Size).unwrap());
}

#[test]
fn order_of_magnitude_is_not_a_metric() {
    let directory = tree();
    for collection in directory.collections() {
        let err = directory
            .is_countable_by_name(&collection.id, "order_of_magnitude")
            .unwrap_err();
        assert_matches!(err, DirectoryError::UnsupportedMetric(_));
    }
    assert!(directory.is_countable_by_name(&cid("MID"), "size").unwrap());
}

#[test]
fn unknown_metric_fails_for_every_collection() {
    let directory = tree();
    let ids = directory
        .collections()
        .iter()
        .map(|c| c.id.clone())
        .chain([cid("NOT_THERE")]);
    for id in ids {
        assert_matches!(
            directory.is_countable_by_name(&id, "bogus_metric"),
            Err(DirectoryError::UnsupportedMetric(ref name)) if name == "bogus_metric"
        );
    }
}

#[test]
fn lookup_policy() {
    let directory = tree();
    let missing = BiobankId::from("missing");
    let (found, logs) = capture_logs(|| directory.biobank_by_id(&missing, Lookup::Lenient));
    assert_matches!(found, Ok(None));
    assert!(logs.contains("WARN"));
    assert!(logs.contains("record not found"));
    assert!(logs.contains("id=missing"));

    let (found, logs) = capture_logs(|| directory.biobank_by_id(&missing, Lookup::Strict));
    assert!(found.is_err());
    assert!(!logs.contains("record not found"));
    assert_matches!(
        directory.biobank_by_id(&missing, Lookup::Strict),
        Err(DirectoryError::NotFound {
            kind: EntityKind::Biobanks,
            ..
        })
    );
    assert_matches!(
        directory.collection_by_id(&cid("missing"), Lookup::Strict),
        Err(DirectoryError::NotFound {
            kind: EntityKind::Collections,
            ..
        })
    );
    let found = directory
        .collection_by_id(&cid("MID"), Lookup::Strict)
        .unwrap()
        .unwrap();
    assert_eq!(found.parent_collection, Some(cid("ROOT")));
}

#[test]
fn biobank_without_collections_has_no_edges() {
    let directory = tree();
    let subgraph = directory
        .biobank_subgraph(&BiobankId::from("BB_EMPTY"))
        .unwrap();
    assert_eq!(subgraph.nodes, vec!["BB_EMPTY".to_string()]);
    assert_eq!(subgraph.edge_count(), 0);
    assert!(
        directory
            .biobank_collections(&BiobankId::from("BB_EMPTY"))
            .unwrap()
            .is_empty()
    );
}

#[test]
fn biobank_subgraph_covers_all_collections() {
    let directory = tree();
    let subgraph = directory.biobank_subgraph(&BiobankId::from("BB1")).unwrap();
    assert_eq!(subgraph.node_count(), 7);
    assert_eq!(subgraph.edge_count(), 6);
    assert_eq!(
        directory
            .biobank_collections(&BiobankId::from("BB1"))
            .unwrap()
            .len(),
        6
    );
}

#[test]
fn collection_subgraph_reaches_biobank() {
    let directory = tree();
    let subgraph = directory.collection_subgraph(&cid("MID")).unwrap();
    for id in ["BB1", "ROOT", "MID", "LEAF1", "LEAF2"] {
        assert!(subgraph.contains(id), "{id} missing");
    }
    assert!(!subgraph.contains("SIDE"));
    assert!(!subgraph.contains("OTHER_ROOT"));
    assert!(subgraph.edge_count() > 0);
}

#[test]
fn top_level_and_owner() {
    let directory = tree();
    assert!(directory.is_top_level_collection(&cid("ROOT")).unwrap());
    assert!(!directory.is_top_level_collection(&cid("LEAF1")).unwrap());
    assert_eq!(
        directory.collection_biobank_id(&cid("LEAF1")).unwrap(),
        &BiobankId::from("BB1")
    );
}

#[test]
fn national_nodes() {
    let directory = build(
        vec![json!({"id": "bbmri-eric:ID:EXT_X", "country": {"id": "US"}})],
        vec![json!({"id": "bbmri-eric:ID:EXT_X:collection:1", "biobank": "bbmri-eric:ID:EXT_X"})],
        vec![
            json!({"id": "bbmri-eric:contactID:PL_1", "country": {"id": "PL"}}),
            json!({"id": "bbmri-eric:contactID:EU_2"}),
        ],
        vec![
            json!({"id": "NET_OWN", "country": {"id": "AT"}, "contact": "bbmri-eric:contactID:PL_1"}),
            json!({"id": "NET_CONTACT", "contact": {"id": "bbmri-eric:contactID:PL_1"}}),
            json!({"id": "NET_BARE", "contact": {"id": "bbmri-eric:contactID:EU_2"}}),
            json!({"id": "NET_NONE"}),
        ],
    );

    assert_eq!(
        directory
            .biobank_national_node(&BiobankId::from("bbmri-eric:ID:EXT_X"))
            .unwrap(),
        CountryCode::from("US")
    );
    assert_eq!(
        directory
            .collection_national_node(&cid("bbmri-eric:ID:EXT_X:collection:1"))
            .unwrap(),
        CountryCode::from("US")
    );
    let network = |id: &str| {
        directory
            .network_national_node(&NetworkId::from(id))
            .unwrap()
            .to_string()
    };
    assert_eq!(network("NET_OWN"), "AT");
    assert_eq!(network("NET_CONTACT"), "PL");
    assert_eq!(network("NET_BARE"), "EU");
    assert_eq!(network("NET_NONE"), "EU");

    assert_eq!(
        directory
            .contact_national_node(&ContactId::from("bbmri-eric:contactID:EU_2"))
            .unwrap(),
        CountryCode::from("EU")
    );
    assert_eq!(
        directory.national_node("NET_CONTACT").unwrap(),
        Some(CountryCode::from("PL"))
    );
    assert_eq!(
        directory.national_node("bbmri-eric:ID:CZ_UNKNOWN").unwrap(),
        Some(CountryCode::from("CZ"))
    );
    assert_matches!(
        directory.network_national_node(&NetworkId::from("NET_MISSING")),
        Err(DirectoryError::NotFound { .. })
    );
}

#[test]
fn contacts_and_networks_of_entities() {
    let directory = build(
        vec![
            json!({"id": "BB1", "country": "NO", "contact": "P1", "networks": ["N1"]}),
            json!({"id": "BB2", "country": "NO"}),
        ],
        vec![json!({"id": "C1", "biobank": "BB1", "networks": [{"id": "N1"}]})],
        vec![json!({"id": "P1", "biobanks": ["BB2"]})],
        vec![json!({"id": "N1", "biobanks": ["BB2"]})],
    );

    let contacts = directory.contacts_of("BB1");
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].id, ContactId::from("P1"));
    // Reverse edge only declared on the contact side.
    assert_eq!(directory.contacts_of("BB2").len(), 1);

    let networks = directory.networks_of("C1");
    assert_eq!(networks[0].id, NetworkId::from("N1"));

    let members = directory.network_members(&NetworkId::from("N1")).unwrap();
    let biobanks = members
        .biobanks
        .iter()
        .map(|b| b.id.as_str())
        .collect::<Vec<_>>();
    assert_eq!(biobanks, vec!["BB1", "BB2"]);
    assert_eq!(members.collections.len(), 1);
}
