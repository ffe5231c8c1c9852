mod common;

use common::{doc, names, open_db, seed_docs, seeded_table};
use serde_json::json;

// Every index whose template covers an inserted document gains exactly one
// entry, and seeking it back resolves to the same primary id.
#[test]
fn insert_updates_every_covering_index() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = db.table("people")?;
    people.index("by_name", "{name}", false)?;
    people.index("by_admin", "{admin}", true)?;

    let mut admin = doc(json!({"name": "Ann", "admin": true}));
    people.append(&mut admin)?;
    assert_eq!(people.index_count("by_name")?, 1);
    assert_eq!(people.index_count("by_admin")?, 1);
    let found = people
        .seek_one("by_name", &doc(json!({"name": "Ann"})))?
        .unwrap();
    assert_eq!(found["_id"], admin["_id"]);

    let mut plain = doc(json!({"name": "Bob"}));
    people.append(&mut plain)?;
    assert_eq!(people.index_count("by_name")?, 2);
    assert_eq!(people.index_count("by_admin")?, 1);
    Ok(())
}

// Across a mixed workload the table count tracks live documents and every
// non-partial index tracks the table count.
#[test]
fn counts_stay_consistent() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_name", "{name}", false)?;
    people.index("by_age", "{age:03}", true)?;

    let docs = people.find(None, None, usize::MAX)?;
    people.delete_doc(&docs[0])?;
    people.delete_doc(&docs[3])?;

    let mut extra = doc(json!({"name": "Extra", "age": 1}));
    people.append(&mut extra)?;

    let mut update = docs[1].clone();
    update.insert("age".into(), json!(99));
    people.save(&update)?;

    assert_eq!(people.records()?, 6);
    assert_eq!(people.index_count("by_name")?, 6);
    assert_eq!(people.index_count("by_age")?, 6);
    Ok(())
}

// Reindexing is restorative: reads after a rebuild match reads before it.
#[test]
fn reindex_is_idempotent() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_age_name", "{age:03}{name}", false)?;
    people.index("by_admin", "{admin}", true)?;

    let before = names(&people.find(Some("by_age_name"), None, usize::MAX)?);
    let admin_count = people.index_count("by_admin")?;

    people.reindex()?;
    assert_eq!(names(&people.find(Some("by_age_name"), None, usize::MAX)?), before);
    assert_eq!(people.index_count("by_admin")?, admin_count);

    people.reindex()?;
    assert_eq!(names(&people.find(Some("by_age_name"), None, usize::MAX)?), before);
    Ok(())
}

// Round trip: what goes in comes back out, attribute for attribute.
#[test]
fn append_get_round_trip() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let table = db.table("mixed")?;
    let mut original = doc(json!({
        "name": "thing",
        "count": 3,
        "ratio": 1.5,
        "flag": false,
        "tags": ["a", "b"],
        "nested": {"x": 1}
    }));
    let id = table.append(&mut original)?;

    let fetched = table.get(&id)?.unwrap();
    assert_eq!(fetched, original);
    Ok(())
}

// Range endpoints: closed intervals keep equal keys, open intervals shed
// them, and a missing bound runs to the end of the index.
#[test]
fn range_endpoint_semantics() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_age", "{age:03}", true)?;

    let lower = doc(json!({"age": 21}));
    let upper = doc(json!({"age": 45}));

    let closed = people.range(Some("by_age"), Some(&lower), Some(&upper), true)?;
    assert_eq!(common::ages(&closed), [21, 21, 40, 40, 40, 45]);

    let open = people.range(Some("by_age"), Some(&lower), Some(&upper), false)?;
    assert_eq!(common::ages(&open), [40, 40, 40]);

    let unbounded_above = people.range(Some("by_age"), Some(&doc(json!({"age": 40}))), None, true)?;
    assert_eq!(common::ages(&unbounded_above), [40, 40, 40, 45, 3000]);

    let unbounded_below = people.range(Some("by_age"), None, Some(&doc(json!({"age": 21}))), true)?;
    assert_eq!(common::ages(&unbounded_below), [21, 21]);

    let everything = people.range(Some("by_age"), None, None, true)?;
    assert_eq!(everything.len(), 7);
    Ok(())
}

// Natural-order ranges compare primary identifiers bytewise.
#[test]
fn natural_range_uses_identifiers() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;

    let all = people.find(None, None, usize::MAX)?;
    let ranged = people.range(None, Some(&all[2]), Some(&all[5]), true)?;
    assert_eq!(names(&ranged), names(&all[2..=5]));

    let exclusive = people.range(None, Some(&all[2]), Some(&all[5]), false)?;
    assert_eq!(names(&exclusive), names(&all[3..=4]));
    Ok(())
}

// Index iteration is ordered by derived key, ties broken by id under
// dupsort.
#[test]
fn index_order_with_duplicate_keys() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_age", "{age:03}", true)?;

    let docs = people.find(Some("by_age"), None, usize::MAX)?;
    // Identifiers are monotonic, so ties come back in insertion order.
    assert_eq!(
        names(&docs),
        [
            "Gareth Bult",
            "Gareth Bult1",
            "John Doe",
            "John Smith",
            "Jim Smith",
            "Fred Bloggs",
            "Squizzey"
        ]
    );
    Ok(())
}

// Documents missing a template attribute stay visible through the table but
// invisible through that index.
#[test]
fn partial_index_visibility() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_admin", "{admin}", true)?;

    assert_eq!(people.records()?, 7);
    assert_eq!(people.index_count("by_admin")?, 3);
    assert_eq!(people.find(Some("by_admin"), None, usize::MAX)?.len(), 3);
    assert_eq!(people.find(None, None, usize::MAX)?.len(), 7);

    // An update that removes the attribute removes the entry; restoring it
    // brings the entry back.
    let mut gareth = people
        .find(None, None, usize::MAX)?
        .into_iter()
        .find(|d| d["name"] == json!("Gareth Bult"))
        .unwrap();
    gareth.remove("admin");
    people.save(&gareth)?;
    assert_eq!(people.index_count("by_admin")?, 2);

    gareth.insert("admin".into(), json!(true));
    people.save(&gareth)?;
    assert_eq!(people.index_count("by_admin")?, 3);
    Ok(())
}

// A failing step rolls back the whole write: no sub-database observes any
// part of it.
#[test]
fn failed_writes_leave_no_trace() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_name", "{name}", false)?;

    let mut txn = db.begin()?;
    let mut extra = doc(json!({"name": "Phantom", "age": 1}));
    txn.append(&people, &mut extra)?;
    // A bad template fails the batch after the append above.
    assert!(matches!(
        txn.create_index(&people, "broken", "{unclosed", false),
        Err(nndb::Error::BadTemplate(_))
    ));
    drop(txn);

    let people = db.table("people")?;
    assert_eq!(people.records()?, 7);
    assert_eq!(people.index_count("by_name")?, 7);
    assert!(people
        .seek_one("by_name", &doc(json!({"name": "Phantom"})))?
        .is_none());
    assert!(!people.has_index("broken"));
    Ok(())
}

// Ensure keeps an index unless forced, and force rebuilds it with the new
// template.
#[test]
fn ensure_semantics() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;

    people.ensure("by_key", "{name}", false, false)?;
    let (template, _) = people.index_info("by_key")?;
    assert_eq!(template, "{name}");

    // Without force the existing definition wins.
    people.ensure("by_key", "{cat}", true, false)?;
    let (template, _) = people.index_info("by_key")?;
    assert_eq!(template, "{name}");

    people.ensure("by_key", "{cat}", true, true)?;
    let (template, duplicates) = people.index_info("by_key")?;
    assert_eq!(template, "{cat}");
    assert!(duplicates);
    assert_eq!(people.index_count("by_key")?, 7);

    // Plain creation of an existing index is refused.
    assert!(matches!(
        people.index("by_key", "{age:03}", false),
        Err(nndb::Error::IndexExists(_))
    ));
    Ok(())
}

#[test]
fn empty_keeps_definitions() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_name", "{name}", false)?;

    people.empty()?;
    assert_eq!(people.records()?, 0);
    assert_eq!(people.index_count("by_name")?, 0);
    assert!(people.has_index("by_name"));
    assert_eq!(people.index_names()?, ["by_name"]);

    // The table is immediately reusable and the index fills back up.
    let mut revived = doc(json!({"name": "Back"}));
    people.append(&mut revived)?;
    assert_eq!(people.index_count("by_name")?, 1);
    Ok(())
}

#[test]
fn save_without_id_is_refused() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    let no_id = doc(json!({"name": "nobody"}));
    assert!(matches!(people.save(&no_id), Err(nndb::Error::NoKey)));
    Ok(())
}

#[test]
fn seed_order_is_identifier_order() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;

    let docs = people.find(None, None, usize::MAX)?;
    let expected: Vec<String> = seed_docs()
        .iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names(&docs), expected);

    let mut ids: Vec<String> = docs
        .iter()
        .map(|d| d["_id"].as_str().unwrap().to_string())
        .collect();
    let sorted = {
        let mut v = ids.clone();
        v.sort();
        v
    };
    assert_eq!(ids, sorted);
    ids.dedup();
    assert_eq!(ids.len(), 7);
    Ok(())
}
