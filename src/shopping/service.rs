//! Shopping-list aggregation. Pure functions of the cart's ingredient lines:
//! no side effects, identical input gives an identical document.

use std::collections::BTreeMap;

use time::{macros::format_description, Date};

use super::repo::CartLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedLine {
    pub name: String,
    pub measurement_unit: String,
    pub total: i64,
}

/// Sums amounts per distinct (name, unit) pair. The BTreeMap key keeps the
/// output sorted by name, then unit, independent of input order. Totals are
/// i64: amounts are capped at 32000 per line, so the sum stays exact for any
/// cart that fits in storage.
pub fn aggregate(lines: impl IntoIterator<Item = CartLine>) -> Vec<AggregatedLine> {
    let mut totals: BTreeMap<(String, String), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.name, line.measurement_unit))
            .or_insert(0) += i64::from(line.amount);
    }
    totals
        .into_iter()
        .map(|((name, measurement_unit), total)| AggregatedLine {
            name,
            measurement_unit,
            total,
        })
        .collect()
}

/// Renders the plain-text shopping list: a header naming the requester and
/// the generation date, then one line per distinct ingredient.
pub fn render(display_name: &str, date: Date, lines: &[AggregatedLine]) -> String {
    let date = date
        .format(format_description!("[year]-[month]-[day]"))
        .expect("static date format");

    let mut doc = format!("Shopping list for: {display_name}\nDate: {date}\n\n");
    for line in lines {
        doc.push_str(&format!(
            "{} ({}) — {}\n",
            line.name, line.measurement_unit, line.total
        ));
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn line(name: &str, unit: &str, amount: i32) -> CartLine {
        CartLine {
            name: name.into(),
            measurement_unit: unit.into(),
            amount,
        }
    }

    fn agg(name: &str, unit: &str, total: i64) -> AggregatedLine {
        AggregatedLine {
            name: name.into(),
            measurement_unit: unit.into(),
            total,
        }
    }

    #[test]
    fn sums_per_ingredient_and_unit_sorted_by_name() {
        // Cart: recipe A uses 10 g salt, recipe B uses 5 g salt + 20 g sugar.
        let lines = vec![
            line("Salt", "g", 10),
            line("Salt", "g", 5),
            line("Sugar", "g", 20),
        ];
        assert_eq!(
            aggregate(lines),
            vec![agg("Salt", "g", 15), agg("Sugar", "g", 20)]
        );
    }

    #[test]
    fn aggregation_is_commutative_over_entry_order() {
        let forward = vec![
            line("Salt", "g", 10),
            line("Sugar", "g", 20),
            line("Salt", "g", 5),
            line("Flour", "kg", 1),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(aggregate(forward), aggregate(reversed));
    }

    #[test]
    fn same_name_different_unit_stays_separate() {
        let lines = vec![line("Milk", "ml", 200), line("Milk", "g", 50)];
        assert_eq!(
            aggregate(lines),
            vec![agg("Milk", "g", 50), agg("Milk", "ml", 200)]
        );
    }

    #[test]
    fn totals_do_not_truncate_at_the_line_bound() {
        let lines = vec![line("Salt", "g", 32000), line("Salt", "g", 32000)];
        assert_eq!(aggregate(lines), vec![agg("Salt", "g", 64000)]);
    }

    #[test]
    fn empty_cart_aggregates_to_nothing() {
        assert!(aggregate(Vec::new()).is_empty());
    }

    #[test]
    fn renders_a_deterministic_document() {
        let totals = vec![agg("Salt", "g", 15), agg("Sugar", "g", 20)];
        let doc = render("Anna Cook", date!(2024 - 03 - 01), &totals);
        assert_eq!(
            doc,
            "Shopping list for: Anna Cook\nDate: 2024-03-01\n\nSalt (g) — 15\nSugar (g) — 20\n"
        );
    }

    #[test]
    fn rendering_twice_gives_the_same_document() {
        let totals = aggregate(vec![line("Salt", "g", 10), line("Salt", "g", 5)]);
        let a = render("Anna", date!(2024 - 03 - 01), &totals);
        let b = render("Anna", date!(2024 - 03 - 01), &totals);
        assert_eq!(a, b);
    }
}
