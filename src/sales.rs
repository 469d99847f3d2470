//! Reader for the game's sale-state file (`sales.xml`).
use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

use crate::model::SaleItem;

/// Read and parse the sale-state file. A missing or unparsable file is fatal.
pub fn load(path: &Path) -> Result<Vec<SaleItem>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read sale source {}", path.display()))?;
    let text = String::from_utf8_lossy(&bytes);
    parse(&text).with_context(|| format!("failed to parse sale source {}", path.display()))
}

/// Parse `<sales><item .../>...</sales>` into sale rows in document order.
pub fn parse(text: &str) -> Result<Vec<SaleItem>> {
    let doc = roxmltree::Document::parse(text.trim_start_matches('\u{feff}'))?;
    let root = doc.root_element();
    if root.tag_name().name() != "sales" {
        return Err(anyhow!(
            "expected <sales> root element, found <{}>",
            root.tag_name().name()
        ));
    }

    let items = root
        .children()
        .filter(|n| n.has_tag_name("item"))
        .filter_map(|item| {
            let Some(reference) = item.attribute("xmlFilename") else {
                warn!("sale item without xmlFilename; skipping");
                return None;
            };
            let reference = reference.trim();
            // A zero would read as about to expire.
            let Some(time_left) = item
                .attribute("timeLeft")
                .and_then(|raw| raw.trim().parse::<i64>().ok())
            else {
                warn!(reference, "sale item without a usable timeLeft; skipping");
                return None;
            };
            Some(SaleItem {
                reference: reference.to_string(),
                price: float(&item, "price"),
                age: number(&item, "age"),
                damage: float(&item, "damage"),
                wear: float(&item, "wear"),
                operating_time_minutes: float(&item, "operatingTime"),
                time_left,
            })
        })
        .collect();
    Ok(items)
}

fn number<T: FromStr + Default>(item: &roxmltree::Node<'_, '_>, attr: &str) -> T {
    match item.attribute(attr) {
        None => T::default(),
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(attr, value = raw, "unparsable sale attribute; using 0");
            T::default()
        }),
    }
}

/// Like [`number`], but `NaN` and infinities count as unparsable.
fn float(item: &roxmltree::Node<'_, '_>, attr: &str) -> f64 {
    let v: f64 = number(item, attr);
    if v.is_finite() {
        v
    } else {
        warn!(attr, "non-finite sale attribute; using 0");
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="utf-8" standalone="no"?>
<sales>
    <item xmlFilename="data/vehicles/fendt/vario700/vario700.xml" age="3" price="123456.5" damage="0.125" wear="0.5" operatingTime="600" timeLeft="12"/>
    <item xmlFilename="$moddir$FS25_Series7810/series7810.xml" age="1" price="9000" damage="0" wear="0.01" operatingTime="30.5" timeLeft="1">
        <boughtConfiguration name="design" id="1"/>
    </item>
</sales>"#;

    #[test]
    fn parses_items_in_order() {
        let items = parse(SAMPLE).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(
            items[0].reference,
            "data/vehicles/fendt/vario700/vario700.xml"
        );
        assert_eq!(items[0].price, 123456.5);
        assert_eq!(items[0].age, 3);
        assert_eq!(items[0].time_left, 12);
        assert_eq!(items[0].operating_time_minutes, 600.0);
        assert_eq!(items[1].reference, "$moddir$FS25_Series7810/series7810.xml");
        assert_eq!(items[1].time_left, 1);
    }

    #[test]
    fn missing_and_bad_numbers_default_to_zero() {
        let items = parse(
            r#"<sales><item xmlFilename="data/a.xml" price="lots" age="-1" timeLeft="4"/></sales>"#,
        )
        .unwrap();
        assert_eq!(items[0].price, 0.0);
        assert_eq!(items[0].age, 0);
        assert_eq!(items[0].damage, 0.0);
        assert_eq!(items[0].time_left, 4);
    }

    #[test]
    fn non_finite_numbers_default_to_zero() {
        let items = parse(
            r#"<sales><item xmlFilename="data/a.xml" price="NaN" damage="inf" wear="-infinity" operatingTime="nan" timeLeft="3"/></sales>"#,
        )
        .unwrap();
        assert_eq!(items[0].price, 0.0);
        assert_eq!(items[0].damage, 0.0);
        assert_eq!(items[0].wear, 0.0);
        assert_eq!(items[0].operating_time_minutes, 0.0);
    }

    #[test]
    fn item_without_usable_time_left_is_skipped() {
        let items = parse(
            r#"<sales>
                <item xmlFilename="data/a.xml" price="1"/>
                <item xmlFilename="data/b.xml" price="1" timeLeft="soon"/>
                <item xmlFilename="data/c.xml" price="1" timeLeft="7"/>
            </sales>"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].reference, "data/c.xml");
        assert_eq!(items[0].time_left, 7);
    }

    #[test]
    fn item_without_reference_is_skipped() {
        let items = parse(
            r#"<sales><item price="1" timeLeft="2"/><item xmlFilename="data/a.xml" timeLeft="2"/></sales>"#,
        )
        .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn rejects_wrong_root_and_bad_xml() {
        assert!(parse("<savegame/>").is_err());
        assert!(parse("<sales><item").is_err());
    }

    #[test]
    fn missing_file_is_error() {
        let td = tempfile::tempdir().unwrap();
        assert!(load(&td.path().join("sales.xml")).is_err());
    }
}
