use std::sync::Arc;

use gridcrate::{
    AttributeType, ColumnSpec, FilterRegistry, Grid, GridConfig, SeaOrmExecutor, StaticSchema,
};
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr};
use sea_orm_migration::prelude::*;

pub mod author_entity;
pub mod book_entity;

use author_entity::AuthorEntity;
use book_entity::BookEntity;

pub type BookGrid = Grid<SeaOrmExecutor<BookEntity>>;

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    seed(&db).await?;
    Ok(db)
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    db.execute_unprepared(
        "INSERT INTO authors (id, name, country) VALUES
            (1, 'Frank Herbert', 'US'),
            (2, 'Ursula K. Le Guin', 'US'),
            (3, 'Iain M. Banks', 'UK')",
    )
    .await?;
    db.execute_unprepared(
        r#"INSERT INTO books (id, title, pages, status, published, released_on, author_id, metadata) VALUES
            (1, 'Dune', 412, 'published', 1, '1965-08-01', 1, '{"genre": "space opera", "edition": {"format": "hardcover"}}'),
            (2, 'Dune Messiah', 256, 'published', 1, '1969-10-15', 1, '{"genre": "space opera", "edition": {"format": "paperback"}}'),
            (3, 'Children of Dune', 444, 'published', 1, '1976-04-01', 1, '{"genre": "space opera"}'),
            (4, 'The Left Hand of Darkness', 304, 'published', 1, '1969-03-01', 2, '{"genre": "social"}'),
            (5, 'The Dispossessed', 387, 'published', 1, '1974-05-01', 2, '{"genre": "social"}'),
            (6, 'A Wizard of Earthsea', 183, 'published', 1, '1968-11-01', 2, '{"genre": "fantasy"}'),
            (7, 'Consider Phlebas', 471, 'published', 1, '1987-04-23', 3, '{"genre": "space opera"}'),
            (8, 'The Player of Games', 309, 'published', 1, '1988-08-01', 3, '{"genre": "space opera"}'),
            (9, 'Untitled 100% Draft', 120, 'draft', 0, NULL, 3, NULL),
            (10, 'Excession', 451, 'archived', 1, '1996-01-01', 3, '{"genre": "space opera"}')"#,
    )
    .await?;
    Ok(())
}

/// Books and authors, with a relation, a SQL expression and a host-side
/// calculation on books.
#[allow(dead_code)]
pub fn book_schema() -> StaticSchema {
    let mut schema = StaticSchema::new();
    schema.entity::<AuthorEntity>();
    schema
        .entity::<BookEntity>()
        .attribute(
            "status",
            AttributeType::Enum(vec![
                "draft".to_string(),
                "published".to_string(),
                "archived".to_string(),
            ]),
        )
        .relation("author", "authors", "author_id", "id")
        .expression("title_length", r#"LENGTH("books"."title")"#, AttributeType::Integer)
        .host_calculation("reading_time");
    schema
}

#[allow(dead_code)]
pub fn book_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new("title")
            .sortable()
            .filterable("text")
            .searchable(),
        ColumnSpec::new("pages").sortable().filterable("auto"),
        ColumnSpec::new("status").filterable("auto"),
        ColumnSpec::new("published").filterable("auto"),
        ColumnSpec::new("released_on").sortable().filterable("auto"),
        ColumnSpec::new("author.name")
            .label("Author")
            .sortable()
            .filterable("text")
            .searchable(),
        ColumnSpec::new("metadata[:genre]")
            .sortable()
            .filterable("text")
            .filter_option("operator", "equals"),
        ColumnSpec::new("title_length").sortable(),
        ColumnSpec::new("reading_time").sortable(),
    ]
}

#[allow(dead_code)]
pub async fn setup_grid(config: GridConfig) -> Result<BookGrid, DbErr> {
    let db = setup_test_db().await?;
    Ok(Grid::new(SeaOrmExecutor::new(db), Arc::new(book_schema()))
        .with_registry(Arc::new(FilterRegistry::with_builtin()))
        .with_config(config))
}

#[allow(dead_code)]
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateAuthorTable), Box::new(CreateBookTable)]
    }
}

pub struct CreateAuthorTable;

impl MigrationName for CreateAuthorTable {
    fn name(&self) -> &'static str {
        "m20250101_000001_create_author_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateAuthorTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        use author_entity::Column;

        let table = Table::create()
            .table(author_entity::Entity)
            .if_not_exists()
            .col(ColumnDef::new(Column::Id).integer().not_null().primary_key())
            .col(ColumnDef::new(Column::Name).text().not_null())
            .col(ColumnDef::new(Column::Country).text().not_null())
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(author_entity::Entity).to_owned())
            .await
    }
}

pub struct CreateBookTable;

impl MigrationName for CreateBookTable {
    fn name(&self) -> &'static str {
        "m20250101_000002_create_book_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBookTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        use book_entity::Column;

        let table = Table::create()
            .table(book_entity::Entity)
            .if_not_exists()
            .col(ColumnDef::new(Column::Id).integer().not_null().primary_key())
            .col(ColumnDef::new(Column::Title).text().not_null())
            .col(ColumnDef::new(Column::Pages).integer().not_null())
            .col(ColumnDef::new(Column::Status).text().not_null())
            .col(ColumnDef::new(Column::Published).boolean().not_null())
            .col(ColumnDef::new(Column::ReleasedOn).date())
            .col(ColumnDef::new(Column::AuthorId).integer().not_null())
            .col(ColumnDef::new(Column::Metadata).json())
            .to_owned();

        manager.create_table(table).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(book_entity::Entity).to_owned())
            .await
    }
}
