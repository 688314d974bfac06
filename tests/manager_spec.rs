use std::sync::Arc;

use managed_query::args;
use managed_query::config::{GlobalPrecedence, ResolverConfig};
use managed_query::db::col;
use managed_query::demo::{self, BOOK, EXAM, PERSON, STUDENT};
use managed_query::manager::*;
use managed_query::models::Row;
use managed_query::Error;
use speculate2::speculate;

fn names(rows: &[Row]) -> Vec<&str> {
    rows.iter().filter_map(|row| row.text("name")).collect()
}

speculate! {
    before {
        let db = demo::open_seeded().expect("Failed to open demo database");
        let resolver = demo::resolver(ResolverConfig::default()).expect("Failed to build resolver");
        let session = demo::managed_session(&db, resolver.clone()).expect("Failed to open session");
    }

    describe "type-bound managers" {
        it "matches the native filter for a simple query" {
            let standard = session.query_native(&PERSON).filter(PERSON.col("age").gt(30)).all().unwrap();
            let managed = session.query(&PERSON).call("older_than", args![30]).unwrap().rows().unwrap();

            assert_eq!(managed, standard);
            assert_eq!(names(&managed), vec!["Person 2"]);
        }

        it "matches the native filters for a chained query" {
            let standard = session
                .query_native(&PERSON)
                .filter(PERSON.col("age").gt(18))
                .filter(PERSON.col("age").lt(40))
                .all()
                .unwrap();
            let managed = session
                .query(&PERSON)
                .call("older_than", args![18]).unwrap()
                .call("younger_than", args![40]).unwrap()
                .rows()
                .unwrap();

            assert_eq!(managed, standard);
            assert_eq!(names(&managed), vec!["Person 1", "Student 1", "Student 2"]);
        }

        it "interleaves custom and native calls" {
            let standard = session
                .query_native(&PERSON)
                .filter(PERSON.col("age").gt(18))
                .filter(PERSON.col("name").contains("1"))
                .filter(PERSON.col("age").lt(40))
                .all()
                .unwrap();
            let managed = session
                .query(&PERSON)
                .call("older_than", args![18]).unwrap()
                .into_query().unwrap()
                .filter(PERSON.col("name").contains("1"))
                .call("younger_than", args![40]).unwrap()
                .rows()
                .unwrap();

            assert_eq!(managed, standard);
            assert_eq!(names(&managed), vec!["Person 1", "Student 1"]);
        }

        it "dispatches native names given as strings" {
            let managed = session
                .query(&PERSON)
                .call("older_than", args![18]).unwrap()
                .call("filter", args![col("name").contains("Student")]).unwrap()
                .call("order_by", args!["-age"]).unwrap()
                .rows()
                .unwrap();

            assert_eq!(names(&managed), vec!["Student 2", "Student 1"]);
        }

        it "returns terminal results unwrapped" {
            let standard = session
                .query_native(&PERSON)
                .filter(PERSON.col("age").eq(25))
                .first()
                .unwrap();
            let step = session.query(&PERSON).call("first_of_exact_age", args![25]).unwrap();

            assert!(step.is_terminal());
            let managed = step.into_terminal().unwrap().into_row().unwrap();
            assert_eq!(managed, standard);
            assert_eq!(managed.unwrap().text("name"), Some("Person 1"));
        }

        it "fails when chaining off a terminal result" {
            let step = session.query(&PERSON).call("first_of_exact_age", args![25]).unwrap();
            let err = step.call("younger_than", args![40]).unwrap_err();

            assert!(matches!(
                err,
                Error::UnknownOperation { ref operation, ref target }
                    if operation == "younger_than" && target == "row"
            ));
        }

        it "refuses to turn a terminal back into a query" {
            let step = session.query(&PERSON).call("count", args![]).unwrap();
            assert!(matches!(step.into_query(), Err(Error::NotQueryable("count"))));
        }

        it "resolves subclass queries through the parent's manager" {
            let query = session.query(&STUDENT);
            let resolution = query.resolve("older_than").unwrap();
            assert!(matches!(resolution, Resolution::TypeBound { entity, .. } if entity.name == "Person"));

            let rows = query.call("older_than", args![22]).unwrap().rows().unwrap();
            assert_eq!(names(&rows), vec!["Student 2"]);
            assert!(rows.iter().all(|row| row.entity == "Student"));
        }

        it "raises unknown operation for entities without that manager" {
            let err = session.query(&BOOK).call("older_than", args![5]).unwrap_err();

            assert!(matches!(
                err,
                Error::UnknownOperation { ref operation, ref target }
                    if operation == "older_than" && target == "Book"
            ));
        }

        it "does not expose columns as operations" {
            assert!(!session.query(&BOOK).has_operation("is_public"));

            let book = session
                .query(&BOOK)
                .filter(BOOK.col("is_public").is_(true))
                .first()
                .unwrap()
                .unwrap();
            assert!(book.has("is_public"));
        }

        it "propagates argument errors from the operation" {
            let err = session.query(&PERSON).call("older_than", args!["old"]).unwrap_err();
            assert!(matches!(err, Error::Argument { .. }));
        }

        it "leaves the receiving query untouched" {
            let base = session.query(&PERSON);
            let refined = base.call("older_than", args![30]).unwrap().into_query().unwrap();

            assert_eq!(base.count().unwrap(), 4);
            assert_eq!(refined.count().unwrap(), 1);
        }
    }

    describe "precedence" {
        it "prefers a subclass override over the parent's operation" {
            let mut registry = demo::registry().unwrap();
            registry
                .register(&STUDENT, ManagerDefinition::new("StudentQueryManager").operation(
                    "older_than",
                    |query, args| {
                        // Students count a year older for this test.
                        Ok(query.filter(STUDENT.col("age").gt(args.int(0)? - 1)).into())
                    },
                ))
                .unwrap();
            let session = ManagedSession::open(&db, Arc::new(Resolver::new(registry)));

            let students = session.query(&STUDENT).call("older_than", args![23]).unwrap().rows().unwrap();
            assert_eq!(names(&students), vec!["Student 2"]);

            let people = session.query(&PERSON).call("older_than", args![23]).unwrap().rows().unwrap();
            assert_eq!(names(&people), vec!["Person 1", "Person 2"]);
        }

        it "never lets a manager shadow a native name" {
            let mut registry = demo::registry().unwrap();
            registry
                .register(&BOOK, ManagerDefinition::new("Shadow").operation("count", |_, _| {
                    Ok(Terminal::Count(-1).into())
                }))
                .unwrap();
            let session = ManagedSession::open(&db, Arc::new(Resolver::new(registry)));

            let step = session.query(&BOOK).call("count", args![]).unwrap();
            assert_eq!(step.into_terminal().and_then(|t| t.as_count()), Some(2));
        }

        it "prefers the type-bound manager over the session manager by default" {
            let mut session = ManagedSession::open(&db, resolver.clone());
            session
                .load_manager(ManagerDefinition::new("Global").operation("older_than", |_, _| {
                    Ok(Terminal::Count(-1).into())
                }))
                .unwrap();

            let resolution = session.query(&PERSON).resolve("older_than").unwrap();
            assert_eq!(resolution.source(), "type_bound");
        }

        it "prefers the session manager when configured global first" {
            let resolver = demo::resolver(ResolverConfig {
                global_precedence: GlobalPrecedence::GlobalFirst,
            })
            .unwrap();
            let mut session = ManagedSession::open(&db, resolver);
            session
                .load_manager(ManagerDefinition::new("Global").operation("older_than", |_, _| {
                    Ok(Terminal::Count(-1).into())
                }))
                .unwrap();

            let step = session.query(&PERSON).call("older_than", args![18]).unwrap();
            assert_eq!(step.into_terminal(), Some(Terminal::Count(-1)));
        }
    }

    describe "joined queries" {
        it "resolves against the primary entity only" {
            let mut registry = demo::registry().unwrap();
            registry
                .register(&EXAM, ManagerDefinition::new("ExamQueryManager").operation(
                    "passed",
                    |query, _| Ok(query.filter(EXAM.col("score").ge(80)).into()),
                ))
                .unwrap();
            let session = ManagedSession::open(&db, Arc::new(Resolver::new(registry)));

            let joined = session
                .query(&STUDENT)
                .join(&EXAM, EXAM.col("student_id").eq_column(STUDENT.col("id")));
            assert_eq!(joined.target().name, "Student");

            let err = joined.call("passed", args![]).unwrap_err();
            assert!(matches!(err, Error::UnknownOperation { ref target, .. } if target == "Student"));

            let rows = joined
                .filter(EXAM.col("score").ge(80))
                .call("older_than", args![18]).unwrap()
                .rows()
                .unwrap();
            assert_eq!(names(&rows), vec!["Student 1"]);
        }
    }

    describe "engine errors" {
        it "passes constraint violations through unchanged" {
            let mut registry = demo::registry().unwrap();
            registry
                .register(&PERSON, ManagerDefinition::new("Writer").operation("add_nameless", |query, _| {
                    let id = query.session().insert(&PERSON, &[("age", 30.into())])?;
                    Ok(Terminal::Scalar(id.into()).into())
                }))
                .unwrap();
            let session = ManagedSession::open(&db, Arc::new(Resolver::new(registry)));

            let err = session.query(&PERSON).call("add_nameless", args![]).unwrap_err();
            assert!(matches!(err, Error::Engine(_)));
        }
    }

    describe "introspection" {
        it "lists native, type-bound and session operations" {
            let operations = session.query(&STUDENT).operations();
            for name in ["filter", "all", "older_than", "younger_than", "first_of_exact_age", "is_book_public"] {
                assert!(operations.contains(name), "missing {}", name);
            }
            assert!(!operations.contains("has_in_title"));
        }
    }
}
