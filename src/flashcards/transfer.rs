//! Import and export of deck contents
//!
//! Two generic formats are supported in both directions:
//! - delimited text (CSV or TSV) with columns `front, back, hint, tags, notes`,
//!   tags separated by `;`
//! - JSON, either a bare array of cards or an object with a `cards` array
//!
//! Decks can also be generated from a user's own word or sentence list.
//! Only card content travels; scheduling state is never exported.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{FlashcardError, Result};
use super::models::{CardContent, Deck, SourceList};

const TAG_SEPARATOR: char = ';';
const HEADERS: [&str; 5] = ["front", "back", "hint", "tags", "notes"];

/// Supported import/export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFormat {
    Csv,
    Tsv,
    Json,
}

impl TransferFormat {
    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        ext.parse().ok()
    }

    fn delimiter(self) -> Option<u8> {
        match self {
            TransferFormat::Csv => Some(b','),
            TransferFormat::Tsv => Some(b'\t'),
            TransferFormat::Json => None,
        }
    }
}

impl FromStr for TransferFormat {
    type Err = FlashcardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(TransferFormat::Csv),
            "tsv" | "tab" | "txt" => Ok(TransferFormat::Tsv),
            "json" => Ok(TransferFormat::Json),
            other => Err(FlashcardError::Import(format!("Unsupported format: {}", other))),
        }
    }
}

impl fmt::Display for TransferFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransferFormat::Csv => "csv",
            TransferFormat::Tsv => "tsv",
            TransferFormat::Json => "json",
        };
        f.write_str(s)
    }
}

/// Structured export of a deck's content
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckExport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub cards: Vec<CardContent>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonImport {
    Deck(DeckExport),
    Cards(Vec<CardContent>),
}

/// Parse card content from `data`. Every exported record comes back, so an
/// exported empty deck imports as an empty deck.
pub fn parse_cards(data: &str, format: TransferFormat) -> Result<DeckExport> {
    match format.delimiter() {
        Some(delimiter) => Ok(DeckExport {
            name: None,
            description: None,
            cards: parse_delimited(data, delimiter)?,
        }),
        None => parse_json(data),
    }
}

fn parse_json(data: &str) -> Result<DeckExport> {
    Ok(match serde_json::from_str::<JsonImport>(data)? {
        JsonImport::Deck(deck) => deck,
        JsonImport::Cards(cards) => DeckExport {
            name: None,
            description: None,
            cards,
        },
    })
}

/// Column index for each card field
struct ColumnMap {
    front: usize,
    back: usize,
    hint: Option<usize>,
    tags: Option<usize>,
    notes: Option<usize>,
}

impl ColumnMap {
    fn positional() -> Self {
        Self {
            front: 0,
            back: 1,
            hint: Some(2),
            tags: Some(3),
            notes: Some(4),
        }
    }

    /// Build a map from a header row, or None if the row is data
    fn from_headers(record: &csv::StringRecord) -> Option<Self> {
        let find = |names: &[&str]| {
            record
                .iter()
                .position(|h| names.contains(&h.trim().to_lowercase().as_str()))
        };

        let front = find(&["front", "question", "word", "term"])?;
        let back = find(&["back", "answer", "meaning", "definition", "translation"])?;
        Some(Self {
            front,
            back,
            hint: find(&["hint", "reading"]),
            tags: find(&["tags", "tag"]),
            notes: find(&["notes", "note"]),
        })
    }
}

fn parse_delimited(data: &str, delimiter: u8) -> Result<Vec<CardContent>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(data.as_bytes());

    let mut columns: Option<ColumnMap> = None;
    let mut cards = Vec::new();

    for (row_idx, result) in reader.records().enumerate() {
        let record = result?;

        if row_idx == 0 {
            if let Some(map) = ColumnMap::from_headers(&record) {
                columns = Some(map);
                continue;
            }
        }
        let map = columns.get_or_insert_with(ColumnMap::positional);

        if record.iter().all(|f| f.trim().is_empty()) {
            log::debug!("Skipping blank row {}", row_idx + 1);
            continue;
        }

        let text = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let tags = field(map.tags)
            .map(|t| {
                t.split(TAG_SEPARATOR)
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        cards.push(CardContent {
            front: text(map.front),
            back: text(map.back),
            hint: field(map.hint),
            tags,
            notes: field(map.notes),
        });
    }

    Ok(cards)
}

/// Serialize a deck's card content
pub fn export_cards(deck: &Deck, format: TransferFormat) -> Result<String> {
    match format.delimiter() {
        Some(delimiter) => export_delimited(deck, delimiter),
        None => {
            let export = DeckExport {
                name: Some(deck.name.clone()),
                description: deck.description.clone(),
                cards: deck.cards.iter().map(|c| c.content.clone()).collect(),
            };
            Ok(serde_json::to_string_pretty(&export)?)
        }
    }
}

fn export_delimited(deck: &Deck, delimiter: u8) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(HEADERS)?;
    for card in &deck.cards {
        let content = &card.content;
        let tags = content.tags.join(&TAG_SEPARATOR.to_string());
        writer.write_record([
            content.front.as_str(),
            content.back.as_str(),
            content.hint.as_deref().unwrap_or(""),
            tags.as_str(),
            content.notes.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| FlashcardError::Import(format!("Failed to flush export: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| FlashcardError::Import(e.to_string()))
}

/// Map a word/sentence list onto cards: text on the front, meaning on the back,
/// reading as the hint
pub fn cards_from_source_list(list: &SourceList) -> Vec<CardContent> {
    list.items
        .iter()
        .filter(|item| !item.text.trim().is_empty())
        .map(|item| CardContent {
            front: item.text.trim().to_string(),
            back: item.meaning.trim().to_string(),
            hint: item.reading.clone(),
            tags: vec![list.name.clone()],
            notes: item.notes.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flashcards::models::{Flashcard, SourceListItem};

    fn sample_deck() -> Deck {
        let mut deck = Deck::new("user", "Verbs".to_string());
        let contents = vec![
            CardContent {
                front: "食べる".to_string(),
                back: "to eat, \"consume\"".to_string(),
                hint: Some("たべる".to_string()),
                tags: vec!["verb".to_string(), "n5".to_string()],
                notes: Some("ichidan\nverb".to_string()),
            },
            CardContent::new("行く", "to go"),
        ];
        for content in contents {
            deck.cards.push(Flashcard::new(deck.id, content));
        }
        deck
    }

    fn contents(deck: &Deck) -> Vec<CardContent> {
        deck.cards.iter().map(|c| c.content.clone()).collect()
    }

    #[test]
    fn test_json_round_trip() {
        let deck = sample_deck();
        let json = export_cards(&deck, TransferFormat::Json).unwrap();
        let imported = parse_cards(&json, TransferFormat::Json).unwrap();

        assert_eq!(imported.name.as_deref(), Some("Verbs"));
        assert_eq!(imported.cards, contents(&deck));
    }

    #[test]
    fn test_csv_round_trip() {
        let deck = sample_deck();
        let csv = export_cards(&deck, TransferFormat::Csv).unwrap();
        assert!(csv.starts_with("front,back,hint,tags,notes"));

        let imported = parse_cards(&csv, TransferFormat::Csv).unwrap();
        assert_eq!(imported.cards, contents(&deck));
    }

    #[test]
    fn test_tsv_round_trip() {
        let deck = sample_deck();
        let tsv = export_cards(&deck, TransferFormat::Tsv).unwrap();
        let imported = parse_cards(&tsv, TransferFormat::Tsv).unwrap();
        assert_eq!(imported.cards, contents(&deck));
    }

    #[test]
    fn test_headerless_csv_is_positional() {
        let data = "犬,dog\n猫,cat,ねこ,animal;n5\n , \n,missing front\n";
        let imported = parse_cards(data, TransferFormat::Csv).unwrap();

        assert_eq!(imported.cards.len(), 3);
        assert_eq!(imported.cards[0], CardContent::new("犬", "dog"));
        assert_eq!(imported.cards[1].hint.as_deref(), Some("ねこ"));
        assert_eq!(imported.cards[1].tags, vec!["animal", "n5"]);
        assert_eq!(imported.cards[2], CardContent::new("", "missing front"));
    }

    #[test]
    fn test_header_aliases_and_column_order() {
        let data = "Meaning,Word,Reading\nwater,水,みず\n";
        let imported = parse_cards(data, TransferFormat::Csv).unwrap();
        assert_eq!(imported.cards[0].front, "水");
        assert_eq!(imported.cards[0].back, "water");
        assert_eq!(imported.cards[0].hint.as_deref(), Some("みず"));
    }

    #[test]
    fn test_json_bare_array() {
        let data = r#"[{"front":"山","back":"mountain","tags":["nature"]},{"front":"","back":"x"}]"#;
        let imported = parse_cards(data, TransferFormat::Json).unwrap();
        assert_eq!(imported.name, None);
        assert_eq!(imported.cards.len(), 2);
        assert_eq!(imported.cards[0].tags, vec!["nature"]);
        assert_eq!(imported.cards[1].front, "");
    }

    #[test]
    fn test_empty_deck_round_trips() {
        let deck = Deck::new("user", "Nothing yet".to_string());
        for format in [TransferFormat::Csv, TransferFormat::Tsv, TransferFormat::Json] {
            let data = export_cards(&deck, format).unwrap();
            let imported = parse_cards(&data, format).unwrap();
            assert!(imported.cards.is_empty(), "{} import was not empty", format);
        }
        assert!(parse_cards("[]", TransferFormat::Json).unwrap().cards.is_empty());
        assert!(parse_cards("{not json", TransferFormat::Json).is_err());
    }

    #[test]
    fn test_blank_sides_and_padding_round_trip() {
        let mut deck = Deck::new("user", "Gaps".to_string());
        let rows = vec![
            CardContent::new("", "answer without a question"),
            CardContent::new("question without an answer", ""),
            CardContent {
                front: "  padded  ".to_string(),
                back: " kept as is".to_string(),
                hint: Some(" spaced hint ".to_string()),
                ..Default::default()
            },
        ];
        for content in rows {
            deck.cards.push(Flashcard::new(deck.id, content));
        }

        for format in [TransferFormat::Csv, TransferFormat::Tsv, TransferFormat::Json] {
            let data = export_cards(&deck, format).unwrap();
            let imported = parse_cards(&data, format).unwrap();
            assert_eq!(imported.cards, contents(&deck), "{} lost content", format);
        }
    }

    #[test]
    fn test_cards_from_source_list() {
        let list = SourceList {
            id: "list-1".to_string(),
            name: "Favourites".to_string(),
            items: vec![
                SourceListItem {
                    text: "ありがとう".to_string(),
                    meaning: "thank you".to_string(),
                    reading: None,
                    notes: Some("casual".to_string()),
                },
                SourceListItem {
                    text: "  ".to_string(),
                    meaning: "blank".to_string(),
                    reading: None,
                    notes: None,
                },
            ],
        };

        let cards = cards_from_source_list(&list);
        assert_eq!(cards.len(), 1);
        assert_eq!(cards[0].front, "ありがとう");
        assert_eq!(cards[0].back, "thank you");
        assert_eq!(cards[0].tags, vec!["Favourites"]);
        assert_eq!(cards[0].notes.as_deref(), Some("casual"));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(TransferFormat::from_path(Path::new("deck.CSV")), Some(TransferFormat::Csv));
        assert_eq!(TransferFormat::from_path(Path::new("deck.json")), Some(TransferFormat::Json));
        assert_eq!(TransferFormat::from_path(Path::new("deck")), None);
    }
}
