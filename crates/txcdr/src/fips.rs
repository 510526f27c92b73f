use std::collections::HashMap;

use crate::parser::ParseError;

/// County names the listing spells differently from the Census file.
/// Applied after the downloaded data, so they win on conflict.
pub static FIPS_OVERRIDES: &[(&str, &str)] = &[
    ("Tom_Green", "48451"),
    ("Van_Zandt", "48467"),
    ("De Witt", "48123"),
    ("Live_Oak", "48297"),
];

const REFERENCE_FIELDS: usize = 7;

/// Uppercase county name (without the `County` suffix) to 5-digit FIPS code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FipsLookup {
    codes: HashMap<String, String>,
}

impl FipsLookup {
    /// Builds the lookup from the pipe-delimited Census county reference file
    /// (`STATE|STATEFP|COUNTYFP|COUNTYNS|COUNTYNAME|CLASSFP|FUNCSTAT`).
    pub fn from_reference(text: &str) -> Result<Self, ParseError> {
        let mut codes = HashMap::new();

        for (index, line) in text.lines().enumerate().skip(1) {
            if line.trim().is_empty() {
                continue;
            }

            let fields: Vec<&str> = line.split('|').collect();
            if fields.len() != REFERENCE_FIELDS {
                return Err(ParseError::MalformedReference {
                    line: index + 1,
                    fields: fields.len(),
                });
            }

            let county = fields[4].replace("County", "").trim().to_uppercase();
            codes.insert(county, format!("{}{}", fields[1], fields[2]));
        }

        let mut lookup = Self { codes };
        lookup.apply_overrides();
        log::debug!("Built FIPS lookup with {} counties", lookup.len());
        Ok(lookup)
    }

    fn apply_overrides(&mut self) {
        for (county, code) in FIPS_OVERRIDES {
            self.codes.insert(county.to_uppercase(), (*code).to_string());
        }
    }

    /// Looks up a cleaned county name, case-insensitively.
    pub fn get(&self, county: &str) -> Option<&str> {
        self.codes.get(&county.to_uppercase()).map(String::as_str)
    }

    /// Like [`FipsLookup::get`] but unmatched counties map to an empty string.
    pub fn code_for(&self, county: &str) -> String {
        self.get(county).unwrap_or_default().to_string()
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

impl FromIterator<(String, String)> for FipsLookup {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        let mut lookup = Self {
            codes: iter
                .into_iter()
                .map(|(county, code)| (county.to_uppercase(), code))
                .collect(),
        };
        lookup.apply_overrides();
        lookup
    }
}
