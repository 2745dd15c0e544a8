#[cfg(feature = "filings")]
use chrono::NaiveDate;

/// Form type of the quarterly institutional holdings report.
pub const FORM_13F_HR: &str = "13F-HR";

/// Options for filtering filing requests
#[cfg(feature = "filings")]
#[derive(Debug, Clone)]
pub struct FilingOptions {
    pub form_types: Vec<String>,
    /// Whether to automatically include amendment forms (e.g., 13F-HR/A when
    /// 13F-HR is requested). Defaults to false: an amendment may restate only
    /// part of a portfolio and would show up as a second snapshot.
    pub include_amendments: bool,
    /// Only filings made within this many years of today. Defaults to 7.
    pub lookback_years: Option<u32>,
    /// Only filings made on or after this date. Takes precedence over
    /// `lookback_years`.
    pub since: Option<NaiveDate>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

#[cfg(feature = "filings")]
impl Default for FilingOptions {
    fn default() -> Self {
        Self {
            form_types: vec![FORM_13F_HR.to_string()],
            include_amendments: false,
            lookback_years: Some(7),
            since: None,
            offset: None,
            limit: None,
        }
    }
}

#[cfg(feature = "filings")]
impl FilingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_form_type(mut self, form_type: impl Into<String>) -> Self {
        self.form_types = vec![form_type.into()];
        self
    }

    pub fn with_form_types(mut self, form_types: Vec<String>) -> Self {
        self.form_types = form_types;
        self
    }

    pub fn with_include_amendments(mut self, include_amendments: bool) -> Self {
        self.include_amendments = include_amendments;
        self
    }

    /// `None` disables the date filter.
    pub fn with_lookback_years(mut self, years: Option<u32>) -> Self {
        self.lookback_years = years;
        self
    }

    pub fn with_since(mut self, since: NaiveDate) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a filing of `form` passes the form type filter.
    pub fn matches_form(&self, form: &str) -> bool {
        let form = form.trim();
        self.form_types.iter().any(|ft| {
            form == ft
                || (self.include_amendments
                    && form.strip_suffix("/A").is_some_and(|base| base == ft))
        })
    }

    /// Earliest filing date accepted, relative to `today`.
    pub fn cutoff(&self, today: NaiveDate) -> Option<NaiveDate> {
        if self.since.is_some() {
            return self.since;
        }
        let years = self.lookback_years?;
        today
            .checked_sub_months(chrono::Months::new(years * 12))
            .or(Some(NaiveDate::MIN))
    }
}

/// Options for portfolio summaries
#[derive(Debug, Clone)]
pub struct SummaryOptions {
    /// Number of holdings listed in the top holdings table.
    pub top_n: usize,
    /// Number of entries in each of the biggest increases/decreases lists.
    pub movers: usize,
    /// Number of largest holdings counted towards concentration.
    pub concentration_top: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            movers: 5,
            concentration_top: 10,
        }
    }
}

impl SummaryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_movers(mut self, movers: usize) -> Self {
        self.movers = movers;
        self
    }

    pub fn with_concentration_top(mut self, concentration_top: usize) -> Self {
        self.concentration_top = concentration_top;
        self
    }
}

/// Options for name to CIK resolution
#[cfg(feature = "resolver")]
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    /// Look up names again that an earlier run marked as not found.
    pub retry_not_found: bool,
    /// Save the cache after this many lookups.
    pub checkpoint_every: usize,
    /// Try the ticker directory before the lookup endpoints.
    pub use_ticker_directory: bool,
    /// Try the bulk `cik-lookup-data.txt` listing. It is large (tens of MB),
    /// so it is off by default.
    pub use_lookup_data: bool,
}

#[cfg(feature = "resolver")]
impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            retry_not_found: false,
            checkpoint_every: 5,
            use_ticker_directory: true,
            use_lookup_data: false,
        }
    }
}

#[cfg(feature = "resolver")]
impl ResolverOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retry_not_found(mut self, retry: bool) -> Self {
        self.retry_not_found = retry;
        self
    }

    pub fn with_checkpoint_every(mut self, every: usize) -> Self {
        self.checkpoint_every = every;
        self
    }

    pub fn with_ticker_directory(mut self, enabled: bool) -> Self {
        self.use_ticker_directory = enabled;
        self
    }

    pub fn with_lookup_data(mut self, enabled: bool) -> Self {
        self.use_lookup_data = enabled;
        self
    }
}

#[cfg(all(test, feature = "filings"))]
mod tests {
    use super::*;

    #[test]
    fn amendments_are_opt_in() {
        let opts = FilingOptions::new();
        assert!(opts.matches_form("13F-HR"));
        assert!(!opts.matches_form("13F-HR/A"));
        assert!(!opts.matches_form("13F-NT"));

        let opts = opts.with_include_amendments(true);
        assert!(opts.matches_form("13F-HR/A"));
    }

    #[test]
    fn cutoff_defaults_to_seven_years() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            FilingOptions::new().cutoff(today),
            NaiveDate::from_ymd_opt(2017, 6, 30)
        );

        let since = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert_eq!(FilingOptions::new().with_since(since).cutoff(today), Some(since));
        assert_eq!(FilingOptions::new().with_lookback_years(None).cutoff(today), None);
    }
}
