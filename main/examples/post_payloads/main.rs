use ribot::prelude::*;

struct ReportErrors;

impl Stage for ReportErrors {
    fn on_error(&self, _: &Crawler, err: &CrawlError) {
        println!("error: {}", err);
    }
}

fn print(_: &Crawler, resp: &Response) {
    println!("- {}\n{}", resp, resp.text());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let crawler = Crawler::new_default()?;
    crawler.use_stage(ReportErrors);

    crawler.post("https://httpbin.org/post", &Payload::text("hello"), print)?;
    crawler.post("https://httpbin.org/post", &Payload::form(vec![("q", "rust crawler"), ("page", "1")]), print)?;
    crawler.post(
        "https://httpbin.org/post",
        &Payload::json(&serde_json::json!({"query": "rust", "tags": ["async", "tokio"]}))?,
        print,
    )?;

    crawler.run().await?;
    println!("{}", crawler.stats());
    Ok(())
}
