use engine_library::{create_temporary_database, Error, Schema, TrackSnapshot};

fn names(crates: &[engine_library::Crate]) -> Vec<String> {
    crates.iter().map(|cr| cr.name().unwrap()).collect()
}

#[test]
fn test_reparenting_moves_only_the_target() {
    for schema in [Schema::V1_18_0Os, Schema::V2_21_2, Schema::V3_0_0] {
        let db = create_temporary_database(schema).unwrap();

        // G -> F -> S
        let grandparent = db.create_root_crate("Grandparent").unwrap();
        let father = grandparent.create_sub_crate("Father").unwrap();
        let son = father.create_sub_crate("Son").unwrap();

        // Move F to the root: G loses its child, S stays under F
        father.set_parent(None).unwrap();

        assert!(grandparent.children().unwrap().is_empty());
        assert_eq!(son.parent().unwrap().unwrap().id(), father.id());
        assert!(father.parent().unwrap().is_none());
        let roots = db.root_crates().unwrap();
        assert!(roots.iter().any(|cr| cr.id() == father.id()));
    }
}

#[test]
fn test_cycles_are_rejected() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let a = db.create_root_crate("A").unwrap();
    let b = a.create_sub_crate("B").unwrap();
    let c = b.create_sub_crate("C").unwrap();

    assert!(matches!(
        a.set_parent(Some(&a)),
        Err(Error::CrateInvalidParent(_))
    ));
    assert!(matches!(
        a.set_parent(Some(&c)),
        Err(Error::CrateInvalidParent(_))
    ));
    // The failed moves must not have changed anything
    assert!(a.parent().unwrap().is_none());
    assert_eq!(c.parent().unwrap().unwrap().id(), b.id());
}

#[test]
fn test_sibling_names_are_unique() {
    for schema in [Schema::V1_18_0Os, Schema::V2_21_2] {
        let db = create_temporary_database(schema).unwrap();
        let summer = db.create_root_crate("Summer").unwrap();
        db.create_root_crate("Winter").unwrap();

        assert!(matches!(
            db.create_root_crate("Summer"),
            Err(Error::CrateInvalidName(_))
        ));
        assert!(matches!(
            db.create_root_crate(""),
            Err(Error::CrateInvalidName(_))
        ));

        // Renaming onto a sibling is also rejected...
        let other = db.create_root_crate("Autumn").unwrap();
        assert!(matches!(
            other.set_name("Summer"),
            Err(Error::CrateInvalidName(_))
        ));
        // ...but the same name is fine on a different level
        let nested = summer.create_sub_crate("Summer").unwrap();
        assert_eq!(nested.name().unwrap(), "Summer");
    }
}

#[test]
fn test_membership_is_idempotent() {
    for schema in [Schema::V1_18_0Os, Schema::V2_21_2, Schema::V3_0_0] {
        let db = create_temporary_database(schema).unwrap();
        let cr = db.create_root_crate("Crate").unwrap();
        let track = db
            .create_track(&TrackSnapshot {
                relative_path: Some("a.mp3".to_string()),
                ..TrackSnapshot::default()
            })
            .unwrap();

        for _ in 0..3 {
            cr.add_track(&track).unwrap();
        }
        assert_eq!(cr.tracks().unwrap().len(), 1, "duplicates on {schema}");

        assert!(matches!(
            cr.add_track_unique(&track),
            Err(Error::CrateAlreadyExists(_))
        ));

        cr.remove_track(&track).unwrap();
        assert!(cr.tracks().unwrap().is_empty());
        assert!(track.is_valid().unwrap(), "track itself must survive");
    }
}

#[test]
fn test_crate_track_order_is_stable() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let cr = db.create_root_crate("Ordered").unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let track = db
            .create_track(&TrackSnapshot {
                relative_path: Some(format!("{i}.mp3")),
                ..TrackSnapshot::default()
            })
            .unwrap();
        cr.add_track(&track).unwrap();
        ids.push(track.id());
    }
    // Removing from the middle keeps the remaining order intact
    let middle = db.track_by_id(ids[2]).unwrap().unwrap();
    cr.remove_track(&middle).unwrap();
    ids.remove(2);

    let listed: Vec<i64> = cr.tracks().unwrap().iter().map(|t| t.id()).collect();
    assert_eq!(listed, ids);
}

#[test]
fn test_sibling_order_with_insert_after() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let first = db.create_root_crate("First").unwrap();
    db.create_root_crate("Last").unwrap();
    db.create_root_crate_after("Middle", &first).unwrap();

    assert_eq!(names(&db.root_crates().unwrap()), ["First", "Middle", "Last"]);

    // Sub-crates order independently of their parents' siblings
    let sub_a = first.create_sub_crate("A").unwrap();
    first.create_sub_crate("C").unwrap();
    first.create_sub_crate_after("B", &sub_a).unwrap();
    assert_eq!(names(&first.children().unwrap()), ["A", "B", "C"]);
}

#[test]
fn test_removing_a_crate_removes_its_subtree() {
    for schema in [Schema::V1_18_0Os, Schema::V2_21_2] {
        let db = create_temporary_database(schema).unwrap();
        let parent = db.create_root_crate("Parent").unwrap();
        let child = parent.create_sub_crate("Child").unwrap();
        let keeper = db.create_root_crate("Keeper").unwrap();

        let stale_parent = parent.clone();
        db.remove_crate(parent).unwrap();

        assert!(!stale_parent.is_valid().unwrap());
        assert!(!child.is_valid().unwrap());
        assert!(matches!(
            child.name(),
            Err(Error::CrateDeleted { .. })
        ));
        assert!(keeper.is_valid().unwrap());
        assert_eq!(db.crates().unwrap().len(), 1);
    }
}

#[test]
fn test_crates_by_name_finds_all_levels() {
    let db = create_temporary_database(Schema::V2_21_2).unwrap();
    let top = db.create_root_crate("Favourites").unwrap();
    let other = db.create_root_crate("Other").unwrap();
    other.create_sub_crate("Favourites").unwrap();

    let found = db.crates_by_name("Favourites").unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().any(|cr| cr.id() == top.id()));
    assert!(db.crates_by_name("Missing").unwrap().is_empty());
}

#[test]
fn test_clear_tracks() {
    let db = create_temporary_database(Schema::V3_0_0).unwrap();
    let cr = db.create_root_crate("Crate").unwrap();
    for i in 0..3 {
        let track = db
            .create_track(&TrackSnapshot {
                relative_path: Some(format!("{i}.mp3")),
                ..TrackSnapshot::default()
            })
            .unwrap();
        cr.add_track(&track).unwrap();
    }
    cr.clear_tracks().unwrap();
    assert!(cr.tracks().unwrap().is_empty());
    assert_eq!(db.tracks().unwrap().len(), 3);
}

#[test]
fn test_removing_a_track_removes_memberships() {
    for schema in [Schema::V1_18_0Os, Schema::V2_21_2, Schema::V3_0_0] {
        let db = create_temporary_database(schema).unwrap();
        let a = db.create_root_crate("A").unwrap();
        let b = db.create_root_crate("B").unwrap();
        let track = db
            .create_track(&TrackSnapshot {
                relative_path: Some("t.mp3".to_string()),
                ..TrackSnapshot::default()
            })
            .unwrap();
        a.add_track(&track).unwrap();
        b.add_track(&track).unwrap();

        db.remove_track(track).unwrap();
        assert!(a.tracks().unwrap().is_empty());
        assert!(b.tracks().unwrap().is_empty());
    }
}
