// src/services/extractor.rs

//! Listing extractor service.
//!
//! Turns rendered page markup into listing records using the configured
//! card selectors.

use std::fmt;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{ExtractorConfig, ListingRecord, Location};
use crate::utils::normalize_whitespace;

/// Why a listing card did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionSkip {
    /// No enclosing anchor, or the anchor has no usable href
    MissingLink,
    /// Fewer than two location nodes on the card
    MissingLocation { link: String },
}

impl fmt::Display for ExtractionSkip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingLink => write!(f, "card has no resolvable link"),
            Self::MissingLocation { link } => write!(f, "card {link} has no city/neighborhood"),
        }
    }
}

/// Service for extracting listing records from page markup.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    base: Url,
    anchor_tag: String,
    card: Selector,
    title: Selector,
    price: Selector,
    specs: Selector,
    description: Selector,
    location: Selector,
}

impl ListingExtractor {
    /// Create an extractor resolving links against `domain`.
    pub fn new(domain: &str, config: &ExtractorConfig) -> Result<Self> {
        Ok(Self {
            base: Url::parse(domain)?,
            anchor_tag: config.anchor_tag.to_ascii_lowercase(),
            card: Self::parse_selector(&config.card_selector)?,
            title: Self::parse_selector(&config.title_selector)?,
            price: Self::parse_selector(&config.price_selector)?,
            specs: Self::parse_selector(&config.specs_selector)?,
            description: Self::parse_selector(&config.description_selector)?,
            location: Self::parse_selector(&config.location_selector)?,
        })
    }

    /// Parse markup once; records can then be iterated any number of times.
    pub fn parse(&self, markup: &str) -> ParsedPage<'_> {
        ParsedPage {
            extractor: self,
            document: Html::parse_document(markup),
        }
    }

    /// Extract every valid record in document order.
    pub fn extract(&self, markup: &str) -> Vec<ListingRecord> {
        let page = self.parse(markup);
        let mut records = Vec::new();
        let mut skipped = 0;

        for candidate in page.candidates() {
            match candidate {
                Ok(record) => records.push(record),
                Err(skip) => {
                    skipped += 1;
                    log::debug!("Skipping listing card: {}", skip);
                }
            }
        }

        if skipped > 0 {
            log::warn!(
                "Extracted {} listings, skipped {} incomplete cards",
                records.len(),
                skipped
            );
        }
        records
    }

    fn extract_card(
        &self,
        card: ElementRef<'_>,
    ) -> std::result::Result<ListingRecord, ExtractionSkip> {
        let link = self
            .enclosing_anchor(card)
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .and_then(|href| self.base.join(href).ok())
            .map(String::from)
            .ok_or(ExtractionSkip::MissingLink)?;

        let mut spots = card
            .select(&self.location)
            .map(|el| normalize_whitespace(&el.text().collect::<String>()));
        let (Some(city), Some(neighborhood)) = (spots.next(), spots.next()) else {
            return Err(ExtractionSkip::MissingLocation { link });
        };

        Ok(ListingRecord::new(
            link,
            Self::text_of(card, &self.title),
            Self::text_of(card, &self.price),
            Self::text_of(card, &self.specs),
            Self::text_of(card, &self.description),
            &Location::new(city, neighborhood),
        ))
    }

    /// Nearest ancestor with the anchor tag name.
    fn enclosing_anchor<'a>(&self, card: ElementRef<'a>) -> Option<ElementRef<'a>> {
        card.ancestors()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name().eq_ignore_ascii_case(&self.anchor_tag))
    }

    /// Text of the first match, or empty when the card lacks the element.
    fn text_of(card: ElementRef<'_>, selector: &Selector) -> String {
        card.select(selector)
            .next()
            .map(|el| normalize_whitespace(&el.text().collect::<String>()))
            .unwrap_or_default()
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// A parsed page bound to the extractor that will read it.
pub struct ParsedPage<'a> {
    extractor: &'a ListingExtractor,
    document: Html,
}

impl ParsedPage<'_> {
    /// Number of listing cards on the page, valid or not.
    pub fn card_count(&self) -> usize {
        self.document.select(&self.extractor.card).count()
    }

    /// Every card in document order, as a record or the reason it was skipped.
    pub fn candidates(
        &self,
    ) -> impl Iterator<Item = std::result::Result<ListingRecord, ExtractionSkip>> + '_ {
        self.document
            .select(&self.extractor.card)
            .map(|card| self.extractor.extract_card(card))
    }

    /// Valid records in document order.
    pub fn records(&self) -> impl Iterator<Item = ListingRecord> + '_ {
        self.candidates().filter_map(|c| c.ok())
    }
}
