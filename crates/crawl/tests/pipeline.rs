use futures::{StreamExt, TryStreamExt};
use spotpass_client::Client;
use spotpass_config::{EndpointConfig, NetworkConfig};
use spotpass_crawl::{CrawlEvent, Crawled, Discovery, FileOutcome, discover, crawl};
use spotpass_queue::{Database, Repository};
use spotpass_registry::{Locale, LocaleMatrix, Platform, Registry};
use spotpass_storage::backend::MockBackend;
use spotpass_storage::{Ledger, StorageBackend};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const APP: &str = "1122334455667788";
const LEDGER: &str = "ledger.jsonl";
const RUN: &str = "2026-10-18";

fn client(server: &MockServer) -> Client {
    let endpoints = EndpointConfig {
        ctr_filelist: format!("{}/p01/filelist", server.uri()),
        ctr_content: format!("{}/p01/nsa", server.uri()),
        wup_tasksheet: format!("{}/p01/tasksheet/1", server.uri()),
    };
    let network = NetworkConfig {
        retries: 2,
        retry_backoff_ms: 1,
        ..NetworkConfig::default()
    };
    Client::new(&network, &endpoints).unwrap()
}

async fn context(server: &MockServer, backend: &Arc<MockBackend>, db: &Database, batch_size: u32) -> spotpass_crawl::Context {
    spotpass_crawl::Context {
        client: client(server),
        backend: backend.clone(),
        ledger: Ledger::open(backend.clone(), LEDGER).await.unwrap(),
        queue: Repository::from(db),
        run: RUN.to_string(),
        concurrency: 1,
        batch_size,
    }
}

fn crawled(events: &[CrawlEvent]) -> Vec<&Crawled> {
    events
        .iter()
        .filter_map(|event| match event {
            CrawlEvent::Crawled(crawled) => Some(crawled.as_ref()),
            _ => None,
        })
        .collect()
}

async fn ledger_lines(backend: &MockBackend) -> usize {
    let data = backend.read(Path::new(LEDGER)).await.unwrap();
    data.split(|b| *b == b'\n').filter(|line| !line.is_empty()).count()
}

async fn requests_to(server: &MockServer, prefix: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.path().to_string())
        .filter(|path| path.starts_with(prefix))
        .collect()
}

async fn serve_task_sheet(server: &MockServer, task: &str) {
    let sheet = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <TaskSheet><TitleId>000500001010ec00</TitleId><Files><File>\
         <Filename>news.bin</Filename><Url>{}/data/news.bin</Url><Size>4</Size>\
         </File></Files></TaskSheet>",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path(format!("/p01/tasksheet/1/{APP}/{task}")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sheet, "application/xml; charset=utf-8"))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/news.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"BOSS"))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_discovery_finds_first_serving_locale() {
    let server = MockServer::start().await;
    // Served, but with the file-list media type: not a task sheet.
    Mock::given(method("GET"))
        .and(path(format!("/p01/tasksheet/1/{APP}/NEWS")))
        .and(query_param("c", "US"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/plain"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/p01/tasksheet/1/{APP}/NEWS")))
        .and(query_param("c", "JP"))
        .and(query_param("l", "ja"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "application/xml"))
        .mount(&server)
        .await;

    let temp_dir = tempfile::tempdir().unwrap();
    let registry_path = temp_dir.path().join("apps.json");
    let mut registry = Registry::open(&registry_path).await.unwrap();
    registry.add_task(Platform::Wup, APP, "param").await.unwrap();
    let registry = Mutex::new(registry);
    let locales = LocaleMatrix::from_locales([Locale::new("US", "en").unwrap(), Locale::new("JP", "ja").unwrap()]);

    let discovery = discover(&client(&server), &registry, &locales, Platform::Wup, APP, "NEWS").await.unwrap();

    assert_eq!(discovery, Discovery::Found(Locale::new("JP", "ja").unwrap()));
    assert!(discovery.exists());
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
    let reloaded = Registry::open(&registry_path).await.unwrap();
    assert_eq!(reloaded.get(Platform::Wup, APP).unwrap().tasks, ["param", "NEWS"]);
}

#[tokio::test]
async fn test_file_list_content_falls_back_through_templates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/p01/filelist/{APP}/FGONLYT")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("FGONLYT\t1\r\n2\r\nfile.bin\t6\t1700000000\r\n\r\n", "text/plain"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/p01/nsa/{APP}/FGONLYT/en_US/file.bin")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"BOSS!!"))
        .mount(&server)
        .await;
    let backend = Arc::new(MockBackend::default());
    let db = Database::connect_in_memory().await.unwrap();
    let ctx = context(&server, &backend, &db, 10).await;
    let mut registry = Registry::in_memory([]);
    registry.add_task(Platform::Ctr, APP, "FGONLYT").await.unwrap();
    ctx.queue.build(&registry, &LocaleMatrix::new(["US"], ["en"]).unwrap()).await.unwrap();

    let events: Vec<CrawlEvent> = crawl(&ctx, Platform::Ctr).try_collect().await.unwrap();

    let content = requests_to(&server, "/p01/nsa/").await;
    let base = format!("/p01/nsa/{APP}/FGONLYT");
    assert_eq!(
        content,
        [
            format!("{base}/file.bin"),
            format!("{base}/en/file.bin"),
            format!("{base}/US/file.bin"),
            format!("{base}/en_US/file.bin"),
        ]
    );
    let [item] = crawled(&events)[..] else {
        panic!("expected one crawled item");
    };
    assert!(matches!(&item.files[..], [FileOutcome::Fetched { url, recorded: true, .. }] if url.path().ends_with("/en_US/file.bin")));
    let archived = format!("{RUN}/US/en/{APP}/FGONLYT/file.bin.boss");
    assert_eq!(backend.read(Path::new(&archived)).await.unwrap(), b"BOSS!!");
    assert!(backend.exists(Path::new(&format!("{RUN}/US/en/{APP}/FGONLYT/filelist.txt"))).await.unwrap());
    assert_eq!(ledger_lines(&backend).await, 1);
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_without_refetching() {
    let server = MockServer::start().await;
    serve_task_sheet(&server, "news").await;
    let backend = Arc::new(MockBackend::default());
    let db = Database::connect_in_memory().await.unwrap();
    let mut registry = Registry::in_memory([]);
    registry.add_task(Platform::Wup, APP, "news").await.unwrap();
    let locales = LocaleMatrix::new(["US", "JP"], ["en"]).unwrap();

    // First run: interrupted as soon as the first item is done.
    {
        let ctx = context(&server, &backend, &db, 1).await;
        assert_eq!(ctx.queue.build(&registry, &locales).await.unwrap(), 2);
        let mut events = Box::pin(crawl(&ctx, Platform::Wup));
        while let Some(event) = events.next().await {
            if matches!(event.unwrap(), CrawlEvent::Crawled(_)) {
                break;
            }
        }
    }
    assert_eq!(requests_to(&server, "/p01/tasksheet/").await.len(), 1);
    assert_eq!(ledger_lines(&backend).await, 1);

    // Second run: rebuilding is additive, and only the remaining item is crawled.
    let ctx = context(&server, &backend, &db, 1).await;
    assert_eq!(ctx.queue.build(&registry, &locales).await.unwrap(), 0);
    let events: Vec<CrawlEvent> = crawl(&ctx, Platform::Wup).try_collect().await.unwrap();
    let items = crawled(&events);
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].item.locale, Locale::new("JP", "en").unwrap());
    assert_eq!(requests_to(&server, "/p01/tasksheet/").await.len(), 2);
    assert_eq!(ledger_lines(&backend).await, 2);

    // Third run: nothing left.
    let events: Vec<CrawlEvent> = crawl(&ctx, Platform::Wup).try_collect().await.unwrap();
    assert!(crawled(&events).is_empty());
    assert_eq!(requests_to(&server, "/p01/tasksheet/").await.len(), 2);
}

#[tokio::test]
async fn test_restart_picks_up_items_claimed_by_interrupted_batch() {
    let server = MockServer::start().await;
    serve_task_sheet(&server, "news").await;
    let backend = Arc::new(MockBackend::default());
    let db = Database::connect_in_memory().await.unwrap();
    let mut registry = Registry::in_memory([]);
    registry.add_task(Platform::Wup, APP, "news").await.unwrap();
    let locales = LocaleMatrix::new(["US", "JP", "GB"], ["en"]).unwrap();

    // The whole queue is claimed as one batch, but the run stops after its
    // first item.
    {
        let ctx = context(&server, &backend, &db, 3).await;
        ctx.queue.build(&registry, &locales).await.unwrap();
        let mut events = Box::pin(crawl(&ctx, Platform::Wup));
        while let Some(event) = events.next().await {
            if matches!(event.unwrap(), CrawlEvent::Crawled(_)) {
                break;
            }
        }
        let stats = ctx.queue.stats(Platform::Wup).await.unwrap();
        assert_eq!((stats.processed, stats.claimed), (1, 2));
    }

    // Restarted straight away, long before any claim lease runs out.
    let ctx = context(&server, &backend, &db, 3).await;
    let events: Vec<CrawlEvent> = crawl(&ctx, Platform::Wup).try_collect().await.unwrap();

    assert!(matches!(events.last(), Some(CrawlEvent::Complete)));
    let locales: Vec<&Locale> = crawled(&events).into_iter().map(|crawled| &crawled.item.locale).collect();
    assert_eq!(locales.len(), 2);
    assert!(!locales.contains(&&Locale::new("US", "en").unwrap()));
    assert_eq!(ctx.queue.stats(Platform::Wup).await.unwrap().pending(), 0);
    assert_eq!(requests_to(&server, "/p01/tasksheet/").await.len(), 3);
    assert_eq!(ledger_lines(&backend).await, 3);
}

#[tokio::test]
async fn test_refetched_files_are_not_duplicated_in_ledger() {
    let server = MockServer::start().await;
    serve_task_sheet(&server, "news").await;
    let backend = Arc::new(MockBackend::default());
    let mut registry = Registry::in_memory([]);
    registry.add_task(Platform::Wup, APP, "news").await.unwrap();
    let locales = LocaleMatrix::new(["US"], ["en"]).unwrap();

    // The same archive crawled from two independent queues, as after losing
    // the queue database.
    for expect_recorded in [true, false] {
        let db = Database::connect_in_memory().await.unwrap();
        let ctx = context(&server, &backend, &db, 5).await;
        ctx.queue.build(&registry, &locales).await.unwrap();
        let events: Vec<CrawlEvent> = crawl(&ctx, Platform::Wup).try_collect().await.unwrap();
        let [item] = crawled(&events)[..] else {
            panic!("expected one crawled item");
        };
        assert!(matches!(&item.files[..], [FileOutcome::Fetched { recorded, .. }] if *recorded == expect_recorded));
    }

    assert_eq!(ledger_lines(&backend).await, 1);
    let line = backend.read(Path::new(LEDGER)).await.unwrap();
    let entry: serde_json::Value = serde_json::from_slice(line.trim_ascii()).unwrap();
    assert_eq!(entry["title_id"], "000500001010EC00");
    assert_eq!(entry["hash"], blake3::hash(b"BOSS").to_hex().as_str());
    assert_eq!(entry["country"], "US");
}
