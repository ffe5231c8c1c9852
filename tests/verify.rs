mod common;

use common::{ages, doc, names, open_db, seed_docs, seeded_table};
use serde_json::json;

#[test]
fn verify_indexed_document_store() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    assert_eq!(people.records()?, 7);

    // 1. Compound sort: zero-padded age then name, bytewise order matches
    //    the expected numeric-then-lexicographic order.
    people.index("by_age_name", "{age:03}{name}", false)?;
    let docs = people.find(Some("by_age_name"), None, usize::MAX)?;
    assert_eq!(
        names(&docs),
        [
            "Gareth Bult",
            "Gareth Bult1",
            "Jim Smith",
            "John Doe",
            "John Smith",
            "Fred Bloggs",
            "Squizzey"
        ]
    );
    assert_eq!(ages(&docs), [21, 21, 40, 40, 40, 45, 3000]);

    // 2. Partial index: only the three admin records have the attribute.
    people.index("by_admin", "{admin}", true)?;
    assert_eq!(people.index_count("by_admin")?, 3);
    let admins = people.find(Some("by_admin"), None, usize::MAX)?;
    assert_eq!(admins.len(), 3);
    assert!(admins.iter().all(|d| d["admin"] == json!(true)));

    // 3. Seek equality on a compound key.
    people.index("by_compound", "{cat}|{name}", true)?;
    let hits = people.seek("by_compound", &doc(json!({"cat": "A", "name": "Squizzey"})))?;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["age"], json!(3000));
    let misses = people.seek("by_compound", &doc(json!({"cat": "C", "name": "Squizzey"})))?;
    assert!(misses.is_empty());

    // 4. Range across the category boundary.
    let ranged = people.range(
        Some("by_compound"),
        Some(&doc(json!({"cat": "A", "name": "Squizzey"}))),
        Some(&doc(json!({"cat": "B", "name": "Gareth Bult1"}))),
        true,
    )?;
    assert_eq!(names(&ranged), ["Squizzey", "Gareth Bult1"]);

    // 5. Update propagation: a save moves every affected index entry.
    people.index("by_age", "{age:03}", true)?;
    let mut squizzey = people
        .seek_one("by_compound", &doc(json!({"cat": "A", "name": "Squizzey"})))?
        .expect("Squizzey should be indexed");
    squizzey.insert("name".into(), json!("!Squizzey"));
    squizzey.insert("age".into(), json!(1));
    people.save(&squizzey)?;

    let by_compound = people.find(Some("by_compound"), None, usize::MAX)?;
    assert_eq!(by_compound[0]["name"], json!("!Squizzey"));
    let by_age = people.find(Some("by_age"), None, usize::MAX)?;
    assert_eq!(by_age[0]["age"], json!(1));

    // 6. Drop and reuse the name: indistinguishable from a fresh table.
    let before: Vec<String> = {
        let fresh = db.table("fresh")?;
        for mut doc in seed_docs() {
            fresh.append(&mut doc)?;
        }
        names(&fresh.find(None, None, usize::MAX)?)
    };
    db.drop("people")?;
    assert!(!db.tables()?.contains(&"people".to_string()));

    let people = db.table("people")?;
    for mut doc in seed_docs() {
        people.append(&mut doc)?;
    }
    assert_eq!(names(&people.find(None, None, usize::MAX)?), before);
    Ok(())
}

#[test]
fn verify_seek_one_and_get() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_name", "{name}", false)?;

    let fred = people
        .seek_one("by_name", &doc(json!({"name": "Fred Bloggs"})))?
        .expect("indexed record");
    assert_eq!(fred["age"], json!(45));

    let id = fred["_id"].as_str().unwrap().as_bytes().to_vec();
    let fetched = people.get(&id)?.expect("fetch by id");
    assert_eq!(fetched["name"], json!("Fred Bloggs"));
    assert_eq!(fetched["_id"], fred["_id"]);

    assert!(people.get(b"no-such-id")?.is_none());
    assert!(people
        .seek_one("by_name", &doc(json!({"name": "Nobody"})))?
        .is_none());
    Ok(())
}

#[test]
fn verify_find_limit_and_filter() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_age_name", "{age:03}{name}", false)?;

    // Limit counts yielded rows, not scanned ones.
    let filter: nndb::Filter = Box::new(|d| d["age"] == json!(40));
    let docs = people.find(Some("by_age_name"), Some(filter), 2)?;
    assert_eq!(names(&docs), ["Jim Smith", "John Doe"]);

    let limited = people.find(None, None, 3)?;
    assert_eq!(limited.len(), 3);
    Ok(())
}

#[test]
fn verify_explicit_ids() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let table = db.table("things")?;

    let mut with_str = doc(json!({"_id": "widget-1", "kind": "widget"}));
    assert_eq!(table.append(&mut with_str)?, b"widget-1".to_vec());

    let mut with_int = doc(json!({"_id": 42, "kind": "gadget"}));
    assert_eq!(table.append(&mut with_int)?, b"42".to_vec());
    assert_eq!(table.get(b"42")?.unwrap()["kind"], json!("gadget"));

    // The same id again is an insert conflict, not a silent overwrite.
    let mut duplicate = doc(json!({"_id": "widget-1", "kind": "other"}));
    assert!(matches!(
        table.append(&mut duplicate),
        Err(nndb::Error::WriteFail(_))
    ));

    // Non-coercible ids are refused.
    let mut bad = doc(json!({"_id": {"nested": true}, "kind": "junk"}));
    assert!(matches!(table.append(&mut bad), Err(nndb::Error::BadId(_))));
    Ok(())
}

#[test]
fn verify_delete_paths() -> anyhow::Result<()> {
    let (_dir, db) = open_db()?;
    let people = seeded_table(&db)?;
    people.index("by_name", "{name}", false)?;

    let fred = people
        .seek_one("by_name", &doc(json!({"name": "Fred Bloggs"})))?
        .unwrap();
    people.delete_doc(&fred)?;
    assert_eq!(people.records()?, 6);
    assert_eq!(people.index_count("by_name")?, 6);
    assert!(people
        .seek_one("by_name", &doc(json!({"name": "Fred Bloggs"})))?
        .is_none());

    // Deleting a missing key is fatal to the write.
    assert!(matches!(
        people.delete([b"no-such-id".as_slice()]),
        Err(nndb::Error::NotFound(_))
    ));
    Ok(())
}
