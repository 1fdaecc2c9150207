use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{clean, clean_nullable, double_option};
use crate::database::query_builder::Assignments;

pub const NAME_TAKEN: &str = "Stage with this name already exists";
pub const NOT_FOUND: &str = "Stage not found";

/// Pipeline stage; `order_index` is 1-based within a tenant
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Stage {
    pub id: Uuid,
    pub tenant_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub weight_percentage: i32,
    pub is_closed_won: bool,
    pub is_closed_lost: bool,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Stage {
    pub fn is_closed(&self) -> bool {
        self.is_closed_won || self.is_closed_lost
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewStage {
    pub name: Option<String>,
    pub description: Option<String>,
    pub weight_percentage: Option<i32>,
    pub is_closed_won: Option<bool>,
    pub is_closed_lost: Option<bool>,
    pub color: Option<String>,
}

/// Check the stage flags and weight; returns the message for a 400
pub fn validate_stage(weight: Option<i32>, won: bool, lost: bool) -> Result<(), &'static str> {
    if let Some(w) = weight {
        if !(0..=100).contains(&w) {
            return Err("Weight percentage must be between 0 and 100");
        }
    }
    if won && lost {
        return Err("A stage cannot be both closed won and closed lost");
    }
    Ok(())
}

impl NewStage {
    /// `order_index` is left at 0 for the repository to assign
    pub fn into_stage(self, tenant_id: i32) -> Result<Stage, &'static str> {
        let name = clean(&self.name).ok_or("Stage name is required")?;
        let won = self.is_closed_won.unwrap_or(false);
        let lost = self.is_closed_lost.unwrap_or(false);
        validate_stage(self.weight_percentage, won, lost)?;
        let now = Utc::now();
        Ok(Stage {
            id: Uuid::new_v4(),
            tenant_id,
            name,
            description: clean(&self.description),
            order_index: 0,
            weight_percentage: self.weight_percentage.unwrap_or(0),
            is_closed_won: won,
            is_closed_lost: lost,
            color: clean(&self.color),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StagePatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub weight_percentage: Option<i32>,
    pub is_closed_won: Option<bool>,
    pub is_closed_lost: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub color: Option<Option<String>>,
}

impl StagePatch {
    pub fn normalized(&self) -> Self {
        Self {
            name: clean(&self.name),
            description: clean_nullable(&self.description),
            color: clean_nullable(&self.color),
            ..self.clone()
        }
    }

    /// Validate against the stage the patch will be applied to
    pub fn validate(&self, current: &Stage) -> Result<(), &'static str> {
        validate_stage(
            self.weight_percentage,
            self.is_closed_won.unwrap_or(current.is_closed_won),
            self.is_closed_lost.unwrap_or(current.is_closed_lost),
        )
    }

    pub fn assignments(&self) -> Assignments {
        let mut set = Assignments::new();
        set.set_some("name", &self.name)
            .set_nullable("description", &self.description)
            .set_some("weight_percentage", &self.weight_percentage)
            .set_some("is_closed_won", &self.is_closed_won)
            .set_some("is_closed_lost", &self.is_closed_lost)
            .set_nullable("color", &self.color);
        set
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StageReorder {
    #[serde(rename = "stageIds", alias = "stage_ids", default)]
    pub stage_ids: Vec<Uuid>,
}
