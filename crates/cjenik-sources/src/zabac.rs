//! Žabac Food Outlet price source.
//!
//! Žabac publishes one CSV per store on a single index page. Store metadata
//! is only available in the CSV filename
//! (`Supermarket<address>-<city>-<zipcode>-<d.m.yyyy>-<time>-<tag>.csv`),
//! and store ids disappeared from the filenames at some point, so a fixed
//! address → id table keeps continuity with previously ingested data.

use chrono::{Datelike, NaiveDate};
use percent_encoding::percent_decode_str;
use regex::Regex;

use cjenik_core::Store;

use crate::client::HttpClient;
use crate::html::extract_csv_links;
use crate::pricelist::{parse_price_list, PriceListColumns};
use crate::SourceError;

const INDEX_URL: &str = "https://zabacfoodoutlet.hr/cjenik/";
pub(crate) const SLUG: &str = "zabac";

/// `unit` is not published; `unit_price` mirrors the retail price column.
const COLUMNS: PriceListColumns = PriceListColumns {
    delimiter: b',',
    product_id: "Artikl",
    name: "Naziv artikla / usluge",
    brand: Some("Marka"),
    barcode: Some("Barcode"),
    category: Some("Kategorija"),
    quantity: Some("Gramaža"),
    unit: None,
    price: Some("Mpc"),
    unit_price: Some("Mpc"),
    best_price_30: Some("Najniža cijena u posljednjih 30 dana"),
    anchor_price: Some("Sidrena cijena na 2.5.2025"),
    special_price: None,
};

/// Known store locations, keyed by lowercase street address.
const STORE_IDS: &[(&str, &str)] = &[
    ("tratinska 80a", "PJ-2"),
    ("nemciceva 1", "PJ-4"),
    ("bozidara magovca", "PJ-5"),
    ("dolac 2", "PJ-6"),
    ("dubrava 256l", "PJ-7"),
    ("ilica 231", "PJ-9"),
    ("zagrebacka cesta 205", "PJ-10"),
    ("savska cesta 206", "PJ-11"),
];

pub struct ZabacSource {
    client: HttpClient,
    index_url: String,
}

impl ZabacSource {
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self::with_index_url(client, INDEX_URL)
    }

    /// Point the source at a different index page (local fixture servers).
    #[must_use]
    pub fn with_index_url(client: HttpClient, index_url: impl Into<String>) -> Self {
        Self {
            client,
            index_url: index_url.into(),
        }
    }

    /// Parse store metadata out of a CSV download URL.
    fn parse_store_info(url: &str) -> Result<Store, SourceError> {
        // No divider between type and address, so the known type prefix is
        // matched literally; only "Supermarket" is in use today.
        let pattern = Regex::new(
            r"^(?P<type>Supermarket)(?P<address>.+)-(?P<city>[^-]+)-(?P<zipcode>\d+)-[^-]+-[^-]+-[^-]+\.csv$",
        )
        .expect("valid store filename regex");

        let basename = url.rsplit('/').next().unwrap_or(url);
        let filename = percent_decode_str(basename).decode_utf8_lossy();

        let captures =
            pattern
                .captures(&filename)
                .ok_or_else(|| SourceError::InvalidPriceList {
                    context: url.to_string(),
                    reason: format!("unrecognized CSV filename {filename:?}"),
                })?;

        let street_address = captures["address"].replace('-', " ");
        let store_id = STORE_IDS
            .iter()
            .find(|(address, _)| *address == street_address.to_lowercase())
            .map(|(_, id)| (*id).to_string())
            .ok_or_else(|| SourceError::InvalidPriceList {
                context: url.to_string(),
                reason: format!("no store id known for address {street_address:?}"),
            })?;

        Ok(Store {
            chain: SLUG.to_string(),
            name: format!("Žabac {store_id}"),
            store_id,
            store_type: captures["type"].to_string(),
            city: captures["city"].to_string(),
            street_address,
            zipcode: captures["zipcode"].to_string(),
            items: Vec::new(),
        })
    }

    async fn fetch_stores(&self, date: NaiveDate) -> Result<Vec<Store>, SourceError> {
        let index = self.client.fetch_text(&self.index_url).await?;

        // Filenames carry the date unpadded: 9.7.2025, not 09.07.2025.
        let date_token = format!("{}.{}.{}", date.day(), date.month(), date.year());
        let links: Vec<String> = extract_csv_links(&index, &self.index_url)
            .into_iter()
            .filter(|url| url.contains(&date_token))
            .collect();

        if links.is_empty() {
            tracing::warn!(date = %date, "no Žabac CSV links for date");
            return Ok(Vec::new());
        }

        let mut stores = Vec::new();
        for url in links {
            let mut store = match Self::parse_store_info(&url) {
                Ok(store) => store,
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "skipping Žabac store");
                    continue;
                }
            };
            let content = match self.client.fetch_text(&url).await {
                Ok(content) => content,
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to fetch Žabac price list");
                    continue;
                }
            };
            let products = match parse_price_list(&content, &COLUMNS, &url) {
                Ok(products) => products,
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "failed to parse Žabac price list");
                    continue;
                }
            };
            if products.is_empty() {
                tracing::warn!(url = %url, "no products in Žabac price list, skipping store");
                continue;
            }
            store.items = products;
            stores.push(store);
        }

        Ok(stores)
    }
}

#[async_trait::async_trait]
impl crate::ChainSource for ZabacSource {
    fn slug(&self) -> &'static str {
        SLUG
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Store>, SourceError> {
        self.fetch_stores(date).await
    }
}
