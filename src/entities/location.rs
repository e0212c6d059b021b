use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Physical place where products are registered
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "locations")]
#[schema(as = Location)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    pub building: Option<String>,
    pub floor: Option<String>,
    pub room: Option<String>,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// "Name (Building, floor 2, room 201)"
    pub fn display_name(&self) -> String {
        let mut parts = Vec::new();
        if let Some(building) = self.building.as_deref().filter(|s| !s.is_empty()) {
            parts.push(building.to_string());
        }
        if let Some(floor) = self.floor.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("floor {floor}"));
        }
        if let Some(room) = self.room.as_deref().filter(|s| !s.is_empty()) {
            parts.push(format!("room {room}"));
        }

        if parts.is_empty() {
            self.name.clone()
        } else {
            format!("{} ({})", self.name, parts.join(", "))
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.active {
                active_model.active = Set(true);
            }
            active_model.created_at = Set(now);
        }

        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_includes_only_present_parts() {
        let now = Utc::now();
        let mut location = Model {
            id: Uuid::new_v4(),
            name: "IT Store".into(),
            building: Some("HQ".into()),
            floor: None,
            room: Some("B12".into()),
            description: None,
            active: true,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(location.display_name(), "IT Store (HQ, room B12)");

        location.building = None;
        location.room = Some(String::new());
        assert_eq!(location.display_name(), "IT Store");
    }
}
