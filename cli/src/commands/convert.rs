use anyhow::Result;
use serde::Serialize;

use plate_core::units::{Unit, convert, parse_serving, to_grams};

use super::helpers::format_quantity;

#[derive(Debug, Serialize)]
pub(crate) struct Conversion {
    quantity: f64,
    unit: Unit,
    /// `None` for the discrete count, which has no mass.
    grams: Option<f64>,
    converted: Option<Converted>,
    /// Relies on 1 ml = 1 g.
    approximate: bool,
}

#[derive(Debug, Serialize)]
struct Converted {
    quantity: f64,
    unit: Unit,
    /// The numeric value was carried over unchanged because one side is a count.
    kept_as_is: bool,
}

pub(crate) fn conversion(serving: &str, to: Option<&str>) -> Result<Conversion> {
    let (quantity, unit) = parse_serving(serving)?;
    let target = to.map(Unit::parse).transpose()?;
    let converted = target.map(|target| Converted {
        quantity: convert(quantity, unit, target),
        unit: target,
        kept_as_is: unit != target
            && !(unit.is_mass_convertible() && target.is_mass_convertible()),
    });
    Ok(Conversion {
        quantity,
        unit,
        grams: unit
            .is_mass_convertible()
            .then(|| to_grams(quantity, unit)),
        approximate: unit.is_volume() || target.is_some_and(Unit::is_volume),
        converted,
    })
}

pub(crate) fn cmd_convert(serving: &str, to: Option<&str>, json: bool) -> Result<()> {
    let c = conversion(serving, to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&c)?);
        return Ok(());
    }

    let from = format_quantity(c.quantity, c.unit);
    match (&c.converted, c.grams) {
        (Some(conv), _) => {
            let into = format_quantity(conv.quantity, conv.unit);
            println!("{from} = {into}");
            if conv.kept_as_is {
                eprintln!("Note: 'unit' is a count, not a mass; the number is kept as is");
            }
        }
        (None, Some(grams)) => println!("{from} = {}", format_quantity(grams, Unit::G)),
        (None, None) => println!("{from} has no gram equivalent"),
    }
    if c.approximate {
        eprintln!("Note: volume conversions assume water density (1 ml = 1 g)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_grams() {
        let c = conversion("2 tbsp", None).unwrap();
        assert_eq!(c.grams, Some(30.0));
        assert!(c.approximate);
        assert!(c.converted.is_none());
    }

    #[test]
    fn test_conversion_between_units() {
        let c = conversion("1 cup", Some("tbsp")).unwrap();
        let conv = c.converted.unwrap();
        assert_eq!(conv.quantity, 16.0);
        assert_eq!(conv.unit, Unit::Tbsp);
        assert!(!conv.kept_as_is);
    }

    #[test]
    fn test_conversion_with_count() {
        let c = conversion("3 units", Some("g")).unwrap();
        assert!(c.grams.is_none());
        let conv = c.converted.unwrap();
        assert_eq!(conv.quantity, 3.0);
        assert!(conv.kept_as_is);
    }

    #[test]
    fn test_conversion_errors() {
        assert!(conversion("abc", None).is_err());
        assert!(conversion("100g", Some("oz")).is_err());
    }
}
