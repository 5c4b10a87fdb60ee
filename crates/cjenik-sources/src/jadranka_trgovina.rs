//! Jadranka Trgovina price source.
//!
//! A single store (Market Maxi, Dražica 5, Mali Lošinj) publishes one daily
//! CSV named `MARKET_MAXI_DRAZICA5_MALILOSINJ_607_DDMMYYYY_0800.csv`, linked
//! from an index page. The file is semicolon-separated and windows-1250
//! encoded; many rows leave the retail price empty while the special-offer
//! price is filled, so rows are kept as published and validation happens
//! downstream.

use chrono::{Datelike, NaiveDate};

use cjenik_core::Store;

use crate::client::HttpClient;
use crate::html::extract_csv_links;
use crate::pricelist::{parse_price_list, PriceListColumns};
use crate::SourceError;

const INDEX_URL: &str = "https://jadranka-trgovina.com/cjenici/";
pub(crate) const SLUG: &str = "jadranka_trgovina";

const COLUMNS: PriceListColumns = PriceListColumns {
    delimiter: b';',
    product_id: "ŠIFRA PROIZVODA",
    name: "NAZIV PROIZVODA",
    brand: Some("MARKA PROIZVODA"),
    barcode: Some("BARKOD"),
    category: Some("KATEGORIJA PROIZVODA"),
    quantity: Some("NETO KOLIČINA"),
    unit: Some("JEDINICA MJERE"),
    price: Some("MALOPRODAJNA CIJENA"),
    unit_price: Some("CIJENA ZA JEDINICU MJERE"),
    best_price_30: Some("NAJNIŽA CIJENA U POSLJEDNIH 30 DANA"),
    anchor_price: Some("SIDRENA CIJENA NA 2.5.2025"),
    special_price: Some("MPC ZA VRIJEME POSEBNOG OBLIKA PRODAJE"),
};

pub struct JadrankaTrgovinaSource {
    client: HttpClient,
    index_url: String,
}

impl JadrankaTrgovinaSource {
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

    /// The one location that publishes prices.
    fn store() -> Store {
        Store {
            chain: SLUG.to_string(),
            store_id: "607".to_string(),
            name: "Jadranka Trgovina Market Maxi".to_string(),
            store_type: "market".to_string(),
            city: "Mali Lošinj".to_string(),
            street_address: "Dražica 5".to_string(),
            zipcode: String::new(),
            items: Vec::new(),
        }
    }

    async fn find_csv_url(&self, date: NaiveDate) -> Result<Option<String>, SourceError> {
        let index = self.client.fetch_text(&self.index_url).await?;
        let date_token = format!("{:02}{:02}{}", date.day(), date.month(), date.year());
        Ok(extract_csv_links(&index, &self.index_url)
            .into_iter()
            .find(|url| url.contains(&date_token)))
    }

    async fn fetch_stores(&self, date: NaiveDate) -> Result<Vec<Store>, SourceError> {
        let Some(csv_url) = self.find_csv_url(date).await? else {
            tracing::warn!(date = %date, "no Jadranka Trgovina CSV for date");
            return Ok(Vec::new());
        };

        let content = self.client.fetch_text(&csv_url).await?;
        let products = parse_price_list(&content, &COLUMNS, &csv_url)?;
        if products.is_empty() {
            tracing::warn!(url = %csv_url, "no products in Jadranka Trgovina price list");
            return Ok(Vec::new());
        }

        let mut store = Self::store();
        tracing::info!(count = products.len(), "Jadranka Trgovina products found");
        store.items = products;
        Ok(vec![store])
    }
}

#[async_trait::async_trait]
impl crate::ChainSource for JadrankaTrgovinaSource {
    fn slug(&self) -> &'static str {
        SLUG
    }

    async fn fetch(&self, date: NaiveDate) -> Result<Vec<Store>, SourceError> {
        self.fetch_stores(date).await
    }
}
