mod common;

use common::{mock_client, read_fixture, read_fixture_bytes};
use form13f::{Cik, DetailedFiling, DirectoryResponse, FilingOperations, FilingOptions, Form13fError, Submission};
use httpmock::{Method::GET, MockServer};

const CIK: Cik = Cik::new(1291422);

fn all_dates() -> FilingOptions {
    FilingOptions::new().with_lookback_years(None)
}

fn mock_submissions(server: &MockServer) -> httpmock::Mock<'_> {
    server.mock(|when, then| {
        when.method(GET).path("/submissions/CIK0001291422.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("submissions/CIK0001291422.json"));
    })
}

#[test]
fn parse_submission() {
    let content = read_fixture("submissions/CIK0001291422.json");
    let submission: Submission = serde_json::from_str(&content).unwrap();

    assert_eq!(submission.name, "EXAMPLE CAPITAL MANAGEMENT LP");
    assert_eq!(submission.filings.recent.len(), 5);

    let filing = DetailedFiling::try_from((&submission.filings.recent, 3)).unwrap();
    assert_eq!(filing.form, "SC 13G");
    assert_eq!(filing.report_date, None);
}

#[test]
fn parse_directory_response() {
    let content = read_fixture("submissions/directory_0001291422-23-000015.json");
    let dir: DirectoryResponse = serde_json::from_str(&content).unwrap();

    assert_eq!(dir.directory.item.len(), 3);
    assert_eq!(dir.directory.item[2].name, "holdings_q3.xml");
    assert_eq!(dir.directory.parent_dir, "/Archives/edgar/data/1291422");
}

#[tokio::test]
async fn filings_keep_13f_hr_only() {
    let server = MockServer::start();
    let mock = mock_submissions(&server);
    let client = mock_client(&server.base_url());

    let filings = client.filings(CIK, Some(all_dates())).await.unwrap();

    mock.assert();
    let accessions: Vec<&str> = filings.iter().map(|f| f.accession_number.as_str()).collect();
    assert_eq!(
        accessions,
        vec!["0001291422-24-000010", "0001291422-24-000006", "0001291422-23-000015"]
    );
}

#[tokio::test]
async fn filings_with_amendments_and_limit() {
    let server = MockServer::start();
    mock_submissions(&server);
    let client = mock_client(&server.base_url());

    let with_amendments = client
        .filings(CIK, Some(all_dates().with_include_amendments(true)))
        .await
        .unwrap();
    assert_eq!(with_amendments.len(), 4);
    assert_eq!(with_amendments[1].form, "13F-HR/A");

    let limited = client
        .filings(CIK, Some(all_dates().with_offset(1).with_limit(1)))
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].accession_number, "0001291422-24-000006");
}

#[tokio::test]
async fn information_table_from_conventional_name() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/Archives/edgar/data/1291422/000129142224000010/form13fInfoTable.xml");
        then.status(200)
            .header("content-type", "text/xml")
            .body(read_fixture_bytes("information_table/prefixed.xml"));
    });
    let client = mock_client(&server.base_url());

    let document = client
        .information_table(CIK, "0001291422-24-000010")
        .await
        .unwrap();

    mock.assert();
    assert_eq!(document.file_name, "form13fInfoTable.xml");
    assert!(document.url.ends_with("/000129142224000010/form13fInfoTable.xml"));
    assert!(!document.content.is_empty());
}

#[tokio::test]
async fn information_table_found_through_directory_listing() {
    let server = MockServer::start();
    let directory = server.mock(|when, then| {
        when.method(GET)
            .path("/Archives/edgar/data/1291422/000129142223000015/index.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(read_fixture("submissions/directory_0001291422-23-000015.json"));
    });
    let table = server.mock(|when, then| {
        when.method(GET)
            .path("/Archives/edgar/data/1291422/000129142223000015/holdings_q3.xml");
        then.status(200)
            .header("content-type", "text/xml")
            .body(read_fixture_bytes("information_table/default_ns.xml"));
    });
    let client = mock_client(&server.base_url());

    let document = client
        .information_table(CIK, "0001291422-23-000015")
        .await
        .unwrap();

    directory.assert();
    table.assert();
    assert_eq!(document.file_name, "holdings_q3.xml");
}

#[tokio::test]
async fn html_rendering_is_not_an_information_table() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET)
            .path("/Archives/edgar/data/1291422/000129142224000006/form13fInfoTable.xml");
        then.status(200)
            .header("content-type", "text/html")
            .body("<html><body><table><tr><td>APPLE INC</td></tr></table></body></html>");
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/Archives/edgar/data/1291422/000129142224000006/index.json");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"directory":{"item":[{"name":"primary_doc.xml"}],"name":"/Archives/edgar/data/1291422/000129142224000006"}}"#);
    });
    let client = mock_client(&server.base_url());

    let result = client.information_table(CIK, "0001291422-24-000006").await;
    assert!(matches!(result, Err(Form13fError::NotFound)));
}

#[tokio::test]
async fn missing_filer_is_not_found() {
    let server = MockServer::start();
    let client = mock_client(&server.base_url());

    let result = client.submissions(Cik::new(1)).await;
    assert!(matches!(result, Err(Form13fError::NotFound)));
}
