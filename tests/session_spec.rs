use managed_query::args;
use managed_query::config::ResolverConfig;
use managed_query::demo::{self, BOOK, PERSON, STUDENT};
use managed_query::manager::*;
use managed_query::Error;
use speculate2::speculate;

speculate! {
    before {
        let db = demo::open_seeded().expect("Failed to open demo database");
        let resolver = demo::resolver(ResolverConfig::default()).expect("Failed to build resolver");
        let mut session = ManagedSession::open(&db, resolver.clone());
        session.load_manager(demo::session_manager()).expect("Failed to load session manager");
    }

    describe "load_manager" {
        it "makes the operation available on the entity it filters" {
            assert!(session.query(&BOOK).has_operation("is_book_public"));
        }

        it "makes the operation available on every entity" {
            assert!(session.query(&STUDENT).has_operation("is_book_public"));
            let rows = session.query(&STUDENT).call("is_book_public", args![]).unwrap().rows().unwrap();
            // Each student pairs with the single public book.
            assert_eq!(rows.len(), 2);
        }

        it "filters with the session operation" {
            let step = session.query(&BOOK).call("is_book_public", args![]).unwrap();
            let count = step.call("count", args![]).unwrap().into_terminal().unwrap();
            assert_eq!(count.as_count(), Some(1));
            assert_eq!(session.query(&BOOK).count().unwrap(), 2);
        }

        it "keeps type-bound managers working alongside it" {
            assert!(session.query(&BOOK).has_operation("has_in_title"));
            let found = session
                .query(&BOOK)
                .call("has_in_title", args!["specific"]).unwrap()
                .into_query().unwrap()
                .first()
                .unwrap();
            assert!(found.is_some());
        }

        it "chains session and type-bound operations" {
            let count = session
                .query(&BOOK)
                .call("is_book_public", args![]).unwrap()
                .call("has_in_title", args!["book"]).unwrap()
                .into_query().unwrap()
                .count()
                .unwrap();
            assert_eq!(count, 1);
        }

        it "replaces the previous session manager" {
            session
                .load_manager(ManagerDefinition::new("Replacement").operation("adults", |query, _| {
                    Ok(query.filter(PERSON.col("age").ge(18)).into())
                }))
                .unwrap();

            assert_eq!(session.global_manager().map(|m| m.name()), Some("Replacement"));
            assert!(session.query(&PERSON).has_operation("adults"));
            let err = session.query(&BOOK).call("is_book_public", args![]).unwrap_err();
            assert!(err.is_unknown_operation());
        }

        it "rejects a definition repeating a name" {
            let err = session
                .load_manager(
                    ManagerDefinition::new("Twice")
                        .operation("a", |query, _| Ok(query.into()))
                        .operation("a", |query, _| Ok(query.into())),
                )
                .unwrap_err();
            assert!(matches!(err, Error::DuplicateOperation { ref entity, .. } if entity == "*"));
            // The previous manager stays loaded.
            assert_eq!(session.global_manager().map(|m| m.name()), Some("SessionManager"));
        }

        it "can be installed through the registry" {
            let registry = Registry::new();
            let mut other = ManagedSession::open(&db, resolver.clone());
            registry.register_global(&mut other, demo::session_manager()).unwrap();

            assert!(registry.lookup_global(&other, "is_book_public").is_some());
            assert!(registry.lookup_global(&other, "has_in_title").is_none());
        }
    }

    describe "session scope" {
        it "does not leak into other sessions" {
            let other = ManagedSession::open(&db, resolver.clone());
            assert!(other.global_manager().is_none());

            let err = other.query(&BOOK).call("is_book_public", args![]).unwrap_err();
            assert!(matches!(
                err,
                Error::UnknownOperation { ref operation, ref target }
                    if operation == "is_book_public" && target == "Book"
            ));
        }

        it "ends when the manager is unloaded" {
            let unloaded = session.unload_manager();
            assert_eq!(unloaded.map(|m| m.name().to_string()), Some("SessionManager".to_string()));
            assert!(!session.query(&BOOK).has_operation("is_book_public"));
        }

        it "shares the database with other sessions" {
            let other = ManagedSession::open(&db, resolver.clone());
            other
                .session()
                .insert(&BOOK, &[("title", "Another book".into()), ("is_public", true.into())])
                .unwrap();

            let count = session
                .query(&BOOK)
                .call("is_book_public", args![]).unwrap()
                .into_query().unwrap()
                .count()
                .unwrap();
            assert_eq!(count, 2);
        }
    }
}
