//! Column-mapped parsing of chain price-list CSVs.
//!
//! Every chain publishes the same conceptual table under different Croatian
//! column headings, delimiters and encodings. A source describes its layout
//! with [`PriceListColumns`] and gets back canonical [`Product`] values;
//! field trimming and decimal parsing live here so each source stays a thin
//! description of its upstream format.

use csv::ReaderBuilder;
use rust_decimal::Decimal;

use cjenik_core::Product;

use crate::SourceError;

/// Maps a chain's CSV headings onto the canonical product fields.
///
/// `product_id` and `name` are required; a row with either cell empty is
/// skipped with a warning. Everything else is optional — `None` means the
/// chain does not publish that column at all.
pub(crate) struct PriceListColumns {
    pub delimiter: u8,
    pub product_id: &'static str,
    pub name: &'static str,
    pub brand: Option<&'static str>,
    pub barcode: Option<&'static str>,
    pub category: Option<&'static str>,
    pub quantity: Option<&'static str>,
    pub unit: Option<&'static str>,
    pub price: Option<&'static str>,
    pub unit_price: Option<&'static str>,
    pub best_price_30: Option<&'static str>,
    pub anchor_price: Option<&'static str>,
    pub special_price: Option<&'static str>,
}

/// Parse a decimal cell, tolerating the comma decimal separator Croatian
/// price lists mix in. Anything unparsable is absent, never zero.
pub(crate) fn parse_decimal(raw: &str) -> Option<Decimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .parse::<Decimal>()
        .or_else(|_| trimmed.replace(',', ".").parse::<Decimal>())
        .ok()
}

/// Parse one chain CSV into products according to `columns`.
///
/// `context` names the file (usually its URL) for diagnostics.
///
/// # Errors
///
/// - [`SourceError::MissingColumn`] — a required heading is absent.
/// - [`SourceError::InvalidPriceList`] — the content is not readable CSV.
pub(crate) fn parse_price_list(
    content: &str,
    columns: &PriceListColumns,
    context: &str,
) -> Result<Vec<Product>, SourceError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(columns.delimiter)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader
        .headers()
        .map_err(|err| SourceError::InvalidPriceList {
            context: context.to_string(),
            reason: err.to_string(),
        })?
        .clone();

    let find = |name: &'static str| -> Option<usize> {
        headers.iter().position(|h| h.trim() == name)
    };
    let require = |name: &'static str| -> Result<usize, SourceError> {
        find(name).ok_or_else(|| SourceError::MissingColumn {
            column: name.to_string(),
        })
    };

    let idx_product_id = require(columns.product_id)?;
    let idx_name = require(columns.name)?;
    let idx_brand = columns.brand.and_then(find);
    let idx_barcode = columns.barcode.and_then(find);
    let idx_category = columns.category.and_then(find);
    let idx_quantity = columns.quantity.and_then(find);
    let idx_unit = columns.unit.and_then(find);
    let idx_price = columns.price.and_then(find);
    let idx_unit_price = columns.unit_price.and_then(find);
    let idx_best_price_30 = columns.best_price_30.and_then(find);
    let idx_anchor_price = columns.anchor_price.and_then(find);
    let idx_special_price = columns.special_price.and_then(find);

    let mut products = Vec::new();
    for (row_num, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(context, row = row_num + 1, error = %err, "skipping bad CSV row");
                continue;
            }
        };
        let cell = |idx: Option<usize>| -> String {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .unwrap_or_default()
                .to_string()
        };

        let product_id = cell(Some(idx_product_id));
        let name = cell(Some(idx_name));
        if product_id.is_empty() || name.is_empty() {
            tracing::warn!(context, row = row_num + 1, "row without product id or name");
            continue;
        }

        products.push(Product {
            product_id,
            product: name,
            brand: cell(idx_brand),
            category: cell(idx_category),
            unit: cell(idx_unit),
            quantity: cell(idx_quantity),
            barcode: cell(idx_barcode),
            price: parse_decimal(&cell(idx_price)),
            unit_price: parse_decimal(&cell(idx_unit_price)),
            best_price_30: parse_decimal(&cell(idx_best_price_30)),
            anchor_price: parse_decimal(&cell(idx_anchor_price)),
            special_price: parse_decimal(&cell(idx_special_price)),
            ..Product::default()
        });
    }

    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).expect("valid test decimal")
    }

    const COLUMNS: PriceListColumns = PriceListColumns {
        delimiter: b',',
        product_id: "Artikl",
        name: "Naziv",
        brand: Some("Marka"),
        barcode: Some("Barcode"),
        category: None,
        quantity: None,
        unit: None,
        price: Some("Mpc"),
        unit_price: Some("Mpc"),
        best_price_30: None,
        anchor_price: None,
        special_price: None,
    };

    #[test]
    fn parses_rows_and_trims_fields() {
        let content = "Artikl,Naziv,Marka,Barcode,Mpc\n\
                       100, Mlijeko 2.8% ,Dukat,38598880001,1.49\n";
        let products = parse_price_list(content, &COLUMNS, "test").expect("parse");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id, "100");
        assert_eq!(products[0].product, "Mlijeko 2.8%");
        assert_eq!(products[0].price, Some(dec("1.49")));
        assert_eq!(products[0].unit_price, Some(dec("1.49")));
    }

    #[test]
    fn comma_decimal_separator_is_accepted() {
        assert_eq!(parse_decimal("1,99"), Some(dec("1.99")));
        assert_eq!(parse_decimal(" 2.50 "), Some(dec("2.50")));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
    }

    #[test]
    fn rows_without_required_cells_are_skipped() {
        let content = "Artikl,Naziv,Marka,Barcode,Mpc\n\
                       ,Mlijeko,Dukat,,1.49\n\
                       200,,Dukat,,1.49\n\
                       300,Kruh,,,1.10\n";
        let products = parse_price_list(content, &COLUMNS, "test").expect("parse");
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].product_id, "300");
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let content = "Sifra,Naziv,Mpc\n1,Mlijeko,1.49\n";
        let result = parse_price_list(content, &COLUMNS, "test");
        assert!(matches!(
            result,
            Err(SourceError::MissingColumn { ref column }) if column == "Artikl"
        ));
    }

    #[test]
    fn missing_price_cell_is_absent_not_zero() {
        let content = "Artikl,Naziv,Marka,Barcode,Mpc\n100,Mlijeko,,,\n";
        let products = parse_price_list(content, &COLUMNS, "test").expect("parse");
        assert_eq!(products[0].price, None);
    }
}
