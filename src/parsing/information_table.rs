use super::utils::{normalize_whitespace, parse_amount};
use crate::error::{Form13fError, Result};
use crate::holdings::{HoldingRecord, PutCall};
use quick_xml::{Reader, events::Event};

/// Configuration options for information table parsing.
#[derive(Debug, Default, Clone)]
pub struct InformationTableConfig {
    /// Stop after this many `infoTable` entries have been read.
    pub max_entries: Option<usize>,
}

/// Streaming parser for the XML information table attached to a 13F-HR filing.
///
/// Filers write the table either with the default namespace
/// (`<informationTable xmlns="...">`) or with an explicit prefix
/// (`<ns1:informationTable xmlns:ns1="...">`). Elements are matched on their
/// local name, so both forms parse the same way.
///
/// Each `infoTable` entry becomes one [`HoldingRecord`]. An entry that lacks
/// `nameOfIssuer`, `cusip`, `value` or `sshPrnamt`, or whose amounts are not
/// non-negative integers, is skipped with a warning. Only a structurally
/// broken document is an error.
///
/// # Examples
///
/// ```
/// use form13f::parsing::information_table::InformationTableParser;
///
/// let xml = br#"<informationTable>
///   <infoTable>
///     <nameOfIssuer>APPLE INC</nameOfIssuer>
///     <titleOfClass>COM</titleOfClass>
///     <cusip>037833100</cusip>
///     <value>1500</value>
///     <shrsOrPrnAmt><sshPrnamt>100</sshPrnamt><sshPrnamtType>SH</sshPrnamtType></shrsOrPrnAmt>
///     <investmentDiscretion>SOLE</investmentDiscretion>
///   </infoTable>
/// </informationTable>"#;
///
/// let records = InformationTableParser::default().parse(xml)?;
/// assert_eq!(records[0].value_thousands, 1500);
/// # Ok::<(), form13f::Form13fError>(())
/// ```
#[derive(Debug, Default, Clone)]
pub struct InformationTableParser {
    config: InformationTableConfig,
}

#[derive(Debug, Clone, Copy)]
enum Field {
    IssuerName,
    SecurityClass,
    Cusip,
    Value,
    Shares,
    ShareType,
    PutCall,
    InvestmentDiscretion,
    OtherManager,
    VotingSole,
    VotingShared,
    VotingNone,
}

impl Field {
    fn from_element(name: &[u8], in_voting_authority: bool) -> Option<Self> {
        let field = match name {
            b"nameOfIssuer" => Field::IssuerName,
            b"titleOfClass" => Field::SecurityClass,
            b"cusip" => Field::Cusip,
            b"value" => Field::Value,
            b"sshPrnamt" => Field::Shares,
            b"sshPrnamtType" => Field::ShareType,
            b"putCall" => Field::PutCall,
            b"investmentDiscretion" => Field::InvestmentDiscretion,
            b"otherManager" => Field::OtherManager,
            b"Sole" if in_voting_authority => Field::VotingSole,
            b"Shared" if in_voting_authority => Field::VotingShared,
            b"None" if in_voting_authority => Field::VotingNone,
            _ => return None,
        };
        Some(field)
    }
}

/// Raw text collected for one `infoTable` entry.
#[derive(Debug, Default)]
struct PendingRecord {
    issuer_name: Option<String>,
    security_class: Option<String>,
    cusip: Option<String>,
    value: Option<String>,
    shares: Option<String>,
    share_type: Option<String>,
    put_call: Option<String>,
    investment_discretion: Option<String>,
    other_manager: Option<String>,
    voting_sole: Option<String>,
    voting_shared: Option<String>,
    voting_none: Option<String>,
}

impl PendingRecord {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::IssuerName => &mut self.issuer_name,
            Field::SecurityClass => &mut self.security_class,
            Field::Cusip => &mut self.cusip,
            Field::Value => &mut self.value,
            Field::Shares => &mut self.shares,
            Field::ShareType => &mut self.share_type,
            Field::PutCall => &mut self.put_call,
            Field::InvestmentDiscretion => &mut self.investment_discretion,
            Field::OtherManager => &mut self.other_manager,
            Field::VotingSole => &mut self.voting_sole,
            Field::VotingShared => &mut self.voting_shared,
            Field::VotingNone => &mut self.voting_none,
        }
    }

    /// Marks the element as present even if it turns out to be empty.
    fn open(&mut self, field: Field) {
        self.slot(field).get_or_insert_with(String::new);
    }

    fn append(&mut self, field: Field, text: &str) {
        self.slot(field).get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self) -> std::result::Result<HoldingRecord, String> {
        let issuer_name = required_text(self.issuer_name, "nameOfIssuer")?;
        let cusip = required_text(self.cusip, "cusip")?;
        let value_thousands = required_amount(self.value, "value")?;
        let shares = required_amount(self.shares, "sshPrnamt")?;

        Ok(HoldingRecord {
            issuer_name,
            cusip,
            security_class: optional_text(self.security_class).unwrap_or_default(),
            value_thousands,
            shares,
            share_type: optional_text(self.share_type).unwrap_or_default(),
            investment_discretion: optional_text(self.investment_discretion).unwrap_or_default(),
            voting_sole: optional_amount(self.voting_sole),
            voting_shared: optional_amount(self.voting_shared),
            voting_none: optional_amount(self.voting_none),
            put_call: self.put_call.as_deref().and_then(PutCall::parse),
            other_manager: optional_text(self.other_manager),
        })
    }
}

fn required_text(raw: Option<String>, element: &str) -> std::result::Result<String, String> {
    raw.map(|text| normalize_whitespace(&text))
        .ok_or_else(|| format!("missing <{}>", element))
}

fn required_amount(raw: Option<String>, element: &str) -> std::result::Result<u64, String> {
    let text = raw.ok_or_else(|| format!("missing <{}>", element))?;
    parse_amount(&text).ok_or_else(|| format!("<{}> is not an amount: '{}'", element, text.trim()))
}

fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|text| normalize_whitespace(&text))
        .filter(|text| !text.is_empty())
}

fn optional_amount(raw: Option<String>) -> u64 {
    raw.as_deref().and_then(parse_amount).unwrap_or(0)
}

impl InformationTableParser {
    pub fn new(config: InformationTableConfig) -> Self {
        Self { config }
    }

    /// Parses an information table document into holding records, in
    /// document order.
    ///
    /// # Errors
    ///
    /// Returns `Form13fError::XmlError` when the document is not well-formed
    /// XML (mismatched tags, truncated content).
    pub fn parse(&self, document: &[u8]) -> Result<Vec<HoldingRecord>> {
        let mut reader = Reader::from_reader(document);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut records = Vec::new();
        let mut pending: Option<PendingRecord> = None;
        let mut field: Option<Field> = None;
        let mut in_voting_authority = false;
        let mut entry = 0usize;

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => match e.local_name().as_ref() {
                    b"infoTable" => {
                        entry += 1;
                        pending = Some(PendingRecord::default());
                        field = None;
                        in_voting_authority = false;
                    }
                    b"votingAuthority" => in_voting_authority = true,
                    name => {
                        if let Some(record) = pending.as_mut() {
                            field = Field::from_element(name, in_voting_authority);
                            if let Some(f) = field {
                                record.open(f);
                            }
                        }
                    }
                },
                Event::Empty(ref e) => {
                    if let (Some(record), Some(f)) = (
                        pending.as_mut(),
                        Field::from_element(e.local_name().as_ref(), in_voting_authority),
                    ) {
                        record.open(f);
                    }
                }
                Event::Text(ref text) => {
                    if let (Some(record), Some(f)) = (pending.as_mut(), field) {
                        record.append(f, &text.unescape()?);
                    }
                }
                Event::CData(ref data) => {
                    if let (Some(record), Some(f)) = (pending.as_mut(), field) {
                        record.append(f, &String::from_utf8_lossy(data));
                    }
                }
                Event::End(ref e) => match e.local_name().as_ref() {
                    b"infoTable" => {
                        if let Some(record) = pending.take() {
                            match record.finish() {
                                Ok(holding) => records.push(holding),
                                Err(reason) => {
                                    tracing::warn!("Skipping infoTable entry {}: {}", entry, reason);
                                }
                            }
                        }
                        field = None;
                        in_voting_authority = false;

                        if self.config.max_entries.is_some_and(|max| records.len() >= max) {
                            break;
                        }
                    }
                    b"votingAuthority" => in_voting_authority = false,
                    _ => field = None,
                },
                Event::Eof => {
                    if pending.is_some() {
                        return Err(Form13fError::XmlError(format!(
                            "document ended inside infoTable entry {}",
                            entry
                        )));
                    }
                    break;
                }
                _ => {}
            }
            buf.clear();
        }

        Ok(records)
    }
}
