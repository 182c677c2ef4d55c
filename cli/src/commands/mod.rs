mod alternatives;
mod catalog;
mod convert;
mod edit;
mod helpers;
mod item;
mod meal;
mod plan;
mod targets;

pub(crate) use alternatives::{cmd_alternatives, cmd_item_alternatives};
pub(crate) use catalog::cmd_catalog;
pub(crate) use convert::cmd_convert;
pub(crate) use edit::cmd_edit;
pub(crate) use item::{cmd_item_add, cmd_item_delete, cmd_item_swap};
pub(crate) use meal::{cmd_meal_add, cmd_meal_delete};
pub(crate) use plan::{cmd_plan_create, cmd_plan_list, cmd_plan_show};
pub(crate) use targets::{biometrics, cmd_targets};
