use form13f::diff::latest_diff;
use form13f::parsing::InformationTableParser;
use form13f::resolver::CikResolver;
use form13f::{Cik, CikOperations, FilingOperations, FilingOptions, Form13fError, ResolverOptions, SecClient, Snapshot};

fn client() -> SecClient {
    SecClient::new("test_agent example@example.com").unwrap()
}

const BERKSHIRE: Cik = Cik::new(1067983);

#[tokio::test]
#[ignore]
async fn berkshire_13f_filings() {
    let client = client();

    let filings = client
        .filings(BERKSHIRE, Some(FilingOptions::new().with_limit(2)))
        .await
        .unwrap();
    assert_eq!(filings.len(), 2);
    assert!(filings.iter().all(|f| f.form == "13F-HR"));

    let mut history = Vec::new();
    for filing in &filings {
        let table = client
            .information_table(BERKSHIRE, &filing.accession_number)
            .await
            .unwrap();
        let records = InformationTableParser::default().parse(&table.content).unwrap();
        assert!(records.len() > 10);
        history.push(Snapshot::new(
            BERKSHIRE,
            filing.metadata().filing_date(),
            filing.accession_number.clone(),
            records,
        ));
    }
    history.sort_by(Snapshot::chronological_cmp);

    assert!(latest_diff(&history).is_ready());
}

#[tokio::test]
#[ignore]
async fn unknown_filer_is_not_found() {
    let result = client().submissions(Cik::new(1)).await;
    assert!(matches!(result, Err(Form13fError::NotFound)));
}

#[tokio::test]
#[ignore]
async fn resolve_well_known_names() {
    let client = client();

    let tickers = client.company_tickers().await.unwrap();
    assert!(tickers.iter().any(|t| t.ticker == "AAPL" && t.cik == 320193));

    let mut resolver = CikResolver::new(&client, ResolverOptions::new());
    assert_eq!(resolver.resolve("Apple Inc.").await, Some(Cik::new(320193)));

    let found = client.lookup_cik("Berkshire Hathaway").await.unwrap();
    assert!(found.is_some());
}
