use anyhow::{Context, Result, bail};
use std::process;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

use plate_core::coalescer::{
    CoalescerConfig, EditRequest, NotificationSink, PendingWriteCoalescer, TracingSink,
};
use plate_core::db::Database;
use plate_core::models::FoodItem;
use plate_core::nutrition::{FoodItemEdit, MacroOverride};
use plate_core::service::PlateService;
use plate_core::units::Unit;

use super::helpers::{describe_item, print_items_table};

const USAGE: &str = "Edit items as '<item> <field> <value>'. Fields: qty, unit, kcal, protein, carbs, fat, name, swap. Ctrl-D saves and exits, Ctrl-C discards unsaved edits.";

/// Echoes every optimistic change to stdout; failures go to stderr.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn notify(&self, message: &str) {
        TracingSink.notify(message);
    }

    fn item_changed(&self, item: &FoodItem) {
        println!("{}", describe_item(item));
    }
}

pub(crate) async fn cmd_edit(service: &PlateService, plan_id: i64, quiescence_ms: u64) -> Result<()> {
    let config = CoalescerConfig {
        quiescence: Duration::from_millis(quiescence_ms),
    };
    let mut session = service.edit_session(plan_id, ConsoleSink, config)?;
    print_items_table(session.items());
    eprintln!("{USAGE}");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let reader = async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_edit_line(&line, service) {
                Ok(Some(request)) => {
                    if tx.send(request).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{e:#}"),
            }
        }
        anyhow::Ok(())
    };

    let (interrupted, read) = tokio::select! {
        (_, read) = async { tokio::join!(session.run(&mut rx), reader) } => (false, read),
        _ = tokio::signal::ctrl_c() => (true, Ok(())),
    };

    let result = close_session(&mut session, interrupted, read);

    // stdin's blocking read cannot be cancelled; exit instead of waiting on it.
    if interrupted {
        process::exit(130);
    }
    result
}

/// Settle pending writes at the end of an edit session, then surface any
/// stdin read error. An interrupt discards pending writes, anything else
/// flushes them, including a failed read.
fn close_session<N: NotificationSink>(
    session: &mut PendingWriteCoalescer<&Database, N>,
    interrupted: bool,
    read: Result<()>,
) -> Result<()> {
    if interrupted {
        let dropped = session.teardown();
        eprintln!("Interrupted; discarded {dropped} unsaved edit(s)");
    } else {
        let written = session.flush_all();
        debug!(written, "flushed pending edits on exit");
    }

    let unconfirmed = session.unconfirmed();
    if !unconfirmed.is_empty() {
        let ids: Vec<String> = unconfirmed.iter().map(ToString::to_string).collect();
        eprintln!("Warning: changes to item(s) {} were not saved", ids.join(", "));
    }

    read.context("Failed to read edit commands from stdin")
}

/// Parse one line of the edit session into a request.
///
/// Blank lines and lines starting with `#` yield `None`.
pub(crate) fn parse_edit_line(line: &str, service: &PlateService) -> Result<Option<EditRequest>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (id_str, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let item_id: i64 = id_str
        .parse()
        .with_context(|| format!("Invalid item id '{id_str}'"))?;
    let rest = rest.trim_start();
    let (field, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    if field.is_empty() {
        bail!("Missing field after item {item_id}");
    }
    let value = value.trim();
    if value.is_empty() {
        bail!("Missing value for '{field}'");
    }

    let number = || -> Result<f64> {
        value
            .parse()
            .with_context(|| format!("Invalid number '{value}' for '{field}'"))
    };

    let edit = match field.to_lowercase().as_str() {
        "qty" | "quantity" | "q" => FoodItemEdit::Quantity(number()?),
        "unit" | "u" => FoodItemEdit::Unit(Unit::parse(value)?),
        "kcal" | "calories" | "cal" => FoodItemEdit::Macros(MacroOverride {
            calories: Some(number()?),
            ..MacroOverride::default()
        }),
        "protein" | "p" => FoodItemEdit::Macros(MacroOverride {
            protein: Some(number()?),
            ..MacroOverride::default()
        }),
        "carbs" | "c" => FoodItemEdit::Macros(MacroOverride {
            carbs: Some(number()?),
            ..MacroOverride::default()
        }),
        "fat" | "f" => FoodItemEdit::Macros(MacroOverride {
            fat: Some(number()?),
            ..MacroOverride::default()
        }),
        "name" | "rename" => FoodItemEdit::Rename(value.to_string()),
        "swap" => FoodItemEdit::Swap(Box::new(service.resolve_catalog_food(value)?.clone())),
        other => bail!("Unknown field '{other}'. Use qty, unit, kcal, protein, carbs, fat, name or swap"),
    };
    Ok(Some(EditRequest { item_id, edit }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::catalog::Catalog;
    use tokio::time::Instant;

    fn service() -> PlateService {
        PlateService::new_in_memory(Catalog::builtin().unwrap()).unwrap()
    }

    fn parse(line: &str) -> Result<Option<EditRequest>> {
        parse_edit_line(line, &service())
    }

    #[test]
    fn test_close_session_flushes_before_read_error() {
        let svc = service();
        let plan = svc.create_plan("Week 1").unwrap();
        let meal = svc.add_meal(plan.id, "breakfast", None).unwrap();
        let item = svc.add_catalog_item(meal.id, "chicken breast", "100g").unwrap();

        let mut session = svc
            .edit_session(plan.id, ConsoleSink, CoalescerConfig::default())
            .unwrap();
        session
            .edit(item.id, &FoodItemEdit::Quantity(150.0), Instant::now())
            .unwrap();

        let err = close_session(&mut session, false, Err(anyhow::anyhow!("broken pipe"))).unwrap_err();
        assert!(format!("{err:#}").contains("broken pipe"));
        assert_eq!(session.pending_count(), 0);
        assert_eq!(svc.db().get_food_item(item.id).unwrap().quantity, 150.0);
    }

    #[test]
    fn test_close_session_interrupt_discards_pending() {
        let svc = service();
        let plan = svc.create_plan("Week 1").unwrap();
        let meal = svc.add_meal(plan.id, "lunch", None).unwrap();
        let item = svc.add_catalog_item(meal.id, "chicken breast", "100g").unwrap();

        let mut session = svc
            .edit_session(plan.id, ConsoleSink, CoalescerConfig::default())
            .unwrap();
        session
            .edit(item.id, &FoodItemEdit::Quantity(150.0), Instant::now())
            .unwrap();

        close_session(&mut session, true, Ok(())).unwrap();
        assert_eq!(session.pending_count(), 0);
        assert_eq!(svc.db().get_food_item(item.id).unwrap().quantity, 100.0);
    }

    #[test]
    fn test_parse_quantity_and_unit() {
        let req = parse("4 qty 200").unwrap().unwrap();
        assert_eq!(req.item_id, 4);
        assert_eq!(req.edit, FoodItemEdit::Quantity(200.0));

        let req = parse("4 u tbsp").unwrap().unwrap();
        assert_eq!(req.edit, FoodItemEdit::Unit(Unit::Tbsp));
    }

    #[test]
    fn test_parse_macro_fields() {
        let req = parse("7 kcal 310").unwrap().unwrap();
        assert_eq!(
            req.edit,
            FoodItemEdit::Macros(MacroOverride {
                calories: Some(310.0),
                ..MacroOverride::default()
            })
        );

        let req = parse("7 P 25.5").unwrap().unwrap();
        assert_eq!(
            req.edit,
            FoodItemEdit::Macros(MacroOverride {
                protein: Some(25.5),
                ..MacroOverride::default()
            })
        );
    }

    #[test]
    fn test_parse_rename_keeps_spaces() {
        let req = parse("2 name  Grandma's oat bake ").unwrap().unwrap();
        assert_eq!(req.edit, FoodItemEdit::Rename("Grandma's oat bake".to_string()));
    }

    #[test]
    fn test_parse_swap_resolves_catalog_food() {
        let req = parse("3 swap chicken breast").unwrap().unwrap();
        match req.edit {
            FoodItemEdit::Swap(entry) => assert_eq!(entry.name, "Chicken breast"),
            other => panic!("expected swap, got {other:?}"),
        }
        assert!(parse("3 swap rice").is_err());
    }

    #[test]
    fn test_parse_skips_blank_and_comments() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
        assert!(parse("# breakfast tweaks").unwrap().is_none());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse("x qty 1").is_err());
        assert!(parse("4").is_err());
        assert!(parse("4 qty").is_err());
        assert!(parse("4 qty lots").is_err());
        assert!(parse("4 colour red").is_err());
        assert!(parse("4 unit oz").is_err());
    }
}
