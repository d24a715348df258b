use serde::Serialize;
use sqlx::PgPool;

use super::repo::{self, MappingBody, OptionBody};

/// Expected header: product_name, keywords, ean, supplier, url, title, countries
const EXPECTED_COLUMNS: usize = 7;

#[derive(Debug, Serialize)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub errors: Vec<RowError>,
}

/// Mapping slugs come from the product name: lowercase, Danish letters
/// transliterated, anything else collapsed to single dashes.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.to_lowercase().chars() {
        match ch {
            'æ' => {
                out.push_str("ae");
                last_dash = false;
            }
            'ø' => {
                out.push_str("oe");
                last_dash = false;
            }
            'å' => {
                out.push_str("aa");
                last_dash = false;
            }
            c if c.is_ascii_alphanumeric() => {
                out.push(c);
                last_dash = false;
            }
            _ => {
                if !last_dash {
                    out.push('-');
                    last_dash = true;
                }
            }
        }
    }
    out.trim_end_matches('-').to_string()
}

/// Splits one CSV line, honoring double-quoted fields with "" escapes.
/// The pack ships no CSV crate, and the admin export format is simple
/// enough that this covers it.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(field.trim().to_string());
                field = String::new();
            }
            c => field.push(c),
        }
    }
    fields.push(field.trim().to_string());
    fields
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Upserts a mapping per row and appends a fresh active option. A bad row
/// is reported and skipped; the import never aborts part-way.
pub async fn import_csv(db: &PgPool, csv: &str) -> anyhow::Result<ImportReport> {
    let mut imported = 0usize;
    let mut errors = Vec::new();

    for (idx, line) in csv.lines().enumerate() {
        let line_no = idx + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        // Header row is optional; recognize and skip it.
        if idx == 0 && trimmed.to_lowercase().starts_with("product_name") {
            continue;
        }

        match parse_row(trimmed) {
            Ok((mapping, option)) => {
                let result = async {
                    let mapping = repo::upsert_mapping(db, &mapping).await?;
                    repo::insert_option(db, mapping.id, &option).await?;
                    anyhow::Ok(())
                }
                .await;
                match result {
                    Ok(()) => imported += 1,
                    Err(e) => errors.push(RowError {
                        line: line_no,
                        message: e.to_string(),
                    }),
                }
            }
            Err(message) => errors.push(RowError {
                line: line_no,
                message,
            }),
        }
    }

    Ok(ImportReport { imported, errors })
}

fn parse_row(line: &str) -> Result<(MappingBody, OptionBody), String> {
    let fields = split_line(line);
    if fields.len() != EXPECTED_COLUMNS {
        return Err(format!(
            "expected {EXPECTED_COLUMNS} columns, got {}",
            fields.len()
        ));
    }
    let [product_name, keywords, ean, supplier, url, title, countries] =
        <[String; EXPECTED_COLUMNS]>::try_from(fields).expect("length checked");

    if product_name.is_empty() {
        return Err("product_name is empty".into());
    }
    if url.is_empty() {
        return Err("url is empty".into());
    }
    url::Url::parse(&url).map_err(|e| format!("bad url: {e}"))?;

    let mapping = MappingBody {
        slug: slugify(&product_name),
        product_name,
        keywords: split_list(&keywords),
        ean: (!ean.is_empty()).then_some(ean),
    };
    let option = OptionBody {
        supplier,
        title,
        url,
        countries: split_list(&countries),
        status: None,
    };
    Ok((mapping, option))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_handles_danish_names() {
        assert_eq!(slugify("Test Produkt 123"), "test-produkt-123");
        assert_eq!(slugify("Jordbær Sirup"), "jordbaer-sirup");
        assert_eq!(slugify("Blå Hawaii!!"), "blaa-hawaii");
        assert_eq!(slugify("  -- x --  "), "x");
    }

    #[test]
    fn split_line_honors_quotes() {
        let fields = split_line(r#"Sirup,"jordbær, bær",5701234,Power,"https://power.dk/p?a=1,b",Jordbær sirup,"DK;SE""#);
        assert_eq!(fields.len(), 7);
        assert_eq!(fields[1], "jordbær, bær");
        assert_eq!(fields[4], "https://power.dk/p?a=1,b");
    }

    #[test]
    fn countries_split_on_comma_or_semicolon() {
        assert_eq!(split_list("DK,SE"), vec!["DK", "SE"]);
        assert_eq!(split_list("DK; SE"), vec!["DK", "SE"]);
        assert!(split_list("").is_empty());
    }

    #[test]
    fn parse_row_rejects_bad_column_count() {
        assert!(parse_row("just,three,columns").is_err());
    }

    #[test]
    fn parse_row_rejects_bad_url() {
        let err =
            parse_row("Produkt,kw,123,Power,not-a-url,Title,DK").unwrap_err();
        assert!(err.contains("bad url"));
    }

    #[test]
    fn parse_row_builds_mapping_and_option() {
        let (mapping, option) =
            parse_row("Test Produkt 123,slush;is,5701,Power,https://power.dk/p,Produkt,DK;DE")
                .unwrap();
        assert_eq!(mapping.slug, "test-produkt-123");
        assert_eq!(mapping.keywords, vec!["slush", "is"]);
        assert_eq!(mapping.ean.as_deref(), Some("5701"));
        assert_eq!(option.countries, vec!["DK", "DE"]);
    }

    #[test]
    fn empty_countries_means_everywhere() {
        let (_, option) =
            parse_row("Produkt,kw,,Power,https://power.dk/p,Title,").unwrap();
        assert!(option.countries.is_empty());
    }
}
