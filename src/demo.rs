//! Demonstration schema: people, students, exams and books, with the
//! managers used by the `mq` binary and the integration specs.

use std::sync::Arc;

use crate::config::ResolverConfig;
use crate::db::{Database, Schema};
use crate::error::Result;
use crate::manager::{ManagedSession, ManagerDefinition, Registry, Resolver};
use crate::models::{ColumnDef, ColumnType, Discriminator, EntityType, Value};

pub static PERSON: EntityType = EntityType {
    name: "Person",
    table: "persons",
    columns: &[
        ColumnDef::new("name", ColumnType::Text),
        ColumnDef::new("age", ColumnType::Integer),
    ],
    parent: None,
    discriminator: Some(Discriminator {
        column: "type",
        identity: "person",
    }),
};

pub static STUDENT: EntityType = EntityType {
    name: "Student",
    table: "persons",
    columns: &[ColumnDef::new("subject", ColumnType::Text).nullable()],
    parent: Some(&PERSON),
    discriminator: Some(Discriminator {
        column: "type",
        identity: "student",
    }),
};

pub static EXAM: EntityType = EntityType {
    name: "Exam",
    table: "exams",
    columns: &[
        ColumnDef::new("title", ColumnType::Text),
        ColumnDef::new("score", ColumnType::Integer),
        ColumnDef::new("student_id", ColumnType::Integer).references("persons"),
    ],
    parent: None,
    discriminator: None,
};

pub static BOOK: EntityType = EntityType {
    name: "Book",
    table: "books",
    columns: &[
        ColumnDef::new("title", ColumnType::Text).nullable(),
        ColumnDef::new("is_public", ColumnType::Boolean),
    ],
    parent: None,
    discriminator: None,
};

pub fn schema() -> Schema {
    Schema::new()
        .with(&PERSON)
        .with(&STUDENT)
        .with(&EXAM)
        .with(&BOOK)
}

pub fn person_manager() -> ManagerDefinition {
    ManagerDefinition::new("PersonQueryManager")
        .operation("older_than", |query, args| {
            Ok(query.filter(PERSON.col("age").gt(args.int(0)?)).into())
        })
        .operation("younger_than", |query, args| {
            Ok(query.filter(PERSON.col("age").lt(args.int(0)?)).into())
        })
        .operation("first_of_exact_age", |query, args| {
            Ok(query.filter(PERSON.col("age").eq(args.int(0)?)).first()?.into())
        })
}

pub fn book_manager() -> ManagerDefinition {
    ManagerDefinition::new("BookQueryManager").operation("has_in_title", |query, args| {
        Ok(query
            .filter(BOOK.col("title").contains(args.text(0)?))
            .into())
    })
}

/// Session-global manager: applies to queries of every entity. Against a
/// non-book entity the books table is pulled into the FROM list.
pub fn session_manager() -> ManagerDefinition {
    ManagerDefinition::new("SessionManager").operation("is_book_public", |query, _| {
        Ok(query.filter(BOOK.col("is_public").is_(true)).into())
    })
}

/// Registry with the type-bound demo managers.
pub fn registry() -> Result<Registry> {
    let mut registry = Registry::new();
    registry.register(&PERSON, person_manager())?;
    registry.register(&BOOK, book_manager())?;
    Ok(registry)
}

pub fn resolver(config: ResolverConfig) -> Result<Arc<Resolver>> {
    Ok(Arc::new(Resolver::with_config(registry()?, config)))
}

/// Insert the demo rows.
pub fn seed(db: &Database) -> Result<()> {
    let session = db.session();
    session.insert(&PERSON, &[("name", "Person 1".into()), ("age", 25.into())])?;
    session.insert(&PERSON, &[("name", "Person 2".into()), ("age", 60.into())])?;
    let student_1 = session.insert(
        &STUDENT,
        &[
            ("name", "Student 1".into()),
            ("age", 21.into()),
            ("subject", "Mathematics".into()),
        ],
    )?;
    let student_2 = session.insert(
        &STUDENT,
        &[
            ("name", "Student 2".into()),
            ("age", 23.into()),
            ("subject", "Physics".into()),
        ],
    )?;
    session.insert(
        &EXAM,
        &[
            ("title", "Mathematics".into()),
            ("score", 94.into()),
            ("student_id", Value::Integer(student_1)),
        ],
    )?;
    session.insert(
        &EXAM,
        &[
            ("title", "Physics".into()),
            ("score", 75.into()),
            ("student_id", Value::Integer(student_2)),
        ],
    )?;
    session.insert(&BOOK, &[("title", "Best book ever".into()), ("is_public", true.into())])?;
    session.insert(
        &BOOK,
        &[("title", "Small specific book".into()), ("is_public", false.into())],
    )?;
    Ok(())
}

/// In-memory demo database with tables created and rows seeded.
pub fn open_seeded() -> Result<Database> {
    let db = Database::open_memory(schema())?;
    db.create_all()?;
    seed(&db)?;
    Ok(db)
}

/// A managed session with the session-global demo manager loaded.
pub fn managed_session(db: &Database, resolver: Arc<Resolver>) -> Result<ManagedSession> {
    let mut session = ManagedSession::open(db, resolver);
    session.load_manager(session_manager())?;
    Ok(session)
}
