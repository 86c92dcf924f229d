use chrono::NaiveDate;
use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    pub title: String,
    pub pages: i32,
    pub status: String,
    pub published: bool,
    pub released_on: Option<NaiveDate>,
    pub author_id: i32,
    // Free-form document: {"genre": ..., "edition": {"format": ...}}
    pub metadata: Option<Json>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::author_entity::Entity",
        from = "Column::AuthorId",
        to = "super::author_entity::Column::Id"
    )]
    Author,
}

impl Related<super::author_entity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// Type alias for easier importing
pub type BookEntity = Entity;
