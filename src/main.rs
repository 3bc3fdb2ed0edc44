use std::env;

use anyhow::{Context, Result, bail};
use serde_json::json;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ehub_pay::checksum::{self, STUDENT_CANONICAL, Timestamp};
use ehub_pay::types::FieldMap;
use ehub_pay::{
    ClientConfig, GatewayConfig, GatewayError, PaymentClient, RequestOptions, TemplateCall,
};

fn usage(program: &str) {
    eprintln!("Usage: {} <command> [args]", program);
    eprintln!("  bill <studentId> [billId]          look up a bill");
    eprintln!("  bills <studentId>                  list a student's bills");
    eprintln!("  pay <studentId> <billId> <amount>  settle a bill");
    eprintln!("  checksum <studentId> <timestamp>   print the request checksum");
    eprintln!("  templates                          list API templates");
    eprintln!("  call <templateId> [key=value ...]  call an API template");
    eprintln!();
    eprintln!("Credentials come from EHUB_CHANNEL_CODE and EHUB_SECRET_KEY.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ehub_pay=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        usage(&args[0]);
        std::process::exit(1);
    }

    let config = GatewayConfig::from_env();
    if let Err(e) = run(&config, &args[1], &args[2..]).await {
        // Gateway failures get the same banner the UI would show
        match e.downcast_ref::<GatewayError>() {
            Some(gateway) => eprintln!("Error: {}", gateway.banner()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(config: &GatewayConfig, command: &str, args: &[String]) -> Result<()> {
    let credential = config.credential();
    let client = PaymentClient::with_config(ClientConfig::from(config))?;
    let options = RequestOptions::default();

    match command {
        "bill" => {
            let student_id = arg(args, 0, "studentId")?;
            let bill_id = args.get(1).map(String::as_str);
            let response = client
                .get_bill_info(&credential, student_id, bill_id, &options)
                .await?;

            let classification = response.classification();
            if !classification.is_success() {
                bail!("{}", classification.banner());
            }
            match response.bill() {
                Some(bill) => {
                    println!("Student: {} ({})", bill.student_name, bill.student_id);
                    println!("Bill:    {}", bill.id);
                    println!("  {}", bill.description);
                    println!("  Amount:  {}", bill.debt_amount);
                    println!("  Created: {}", bill.create_date);
                }
                None => println!("{}", classification.message),
            }
        }
        "bills" => {
            let student_id = arg(args, 0, "studentId")?;
            let response = client.get_bills(&credential, student_id, &options).await?;
            if let Some(failure) = response.failure() {
                bail!("{}", failure.banner());
            }

            println!("Student: {} ({})", response.student_name, response.student_id);
            println!("Found {} bill(s), total {}", response.bills.len(), response.total_amount);
            for bill in response.records() {
                println!("\n{}", bill.id);
                println!("  {}", bill.description);
                println!("  Amount:  {}", bill.debt_amount);
                println!("  Created: {}", bill.create_date);
            }
        }
        "pay" => {
            let student_id = arg(args, 0, "studentId")?;
            let bill_id = arg(args, 1, "billId")?;
            let amount = arg(args, 2, "amount")?;
            let result = client
                .pay_bill(&credential, student_id, bill_id, amount, &options)
                .await?;

            if result.is_success() {
                println!("Payment successful: {}", result.body);
            } else {
                bail!("Payment failed (HTTP {}): {}", result.status, result.body);
            }
        }
        "checksum" => {
            let student_id = arg(args, 0, "studentId")?;
            let millis: u64 = arg(args, 1, "timestamp")?
                .parse()
                .context("timestamp must be milliseconds since the epoch")?;

            let mut values = FieldMap::new();
            values.insert("studentId".into(), json!(student_id));
            values.insert("channelCode".into(), json!(credential.channel_code));
            let digest = checksum::compute_checksum(
                &STUDENT_CANONICAL,
                &values,
                &credential.secret_key,
                Timestamp::from_millis(millis),
            );
            println!("{}", digest);
        }
        "templates" => {
            let registry = config.templates()?;
            for template in registry.all() {
                println!(
                    "{:<14} {:<6} {:<28} {}",
                    template.id, template.method, template.endpoint, template.name
                );
            }
        }
        "call" => {
            let template_id = arg(args, 0, "templateId")?;
            let registry = config.templates()?;
            let template = registry.get(template_id)?;

            let mut call = TemplateCall::default();
            for pair in &args[1..] {
                let (key, value) = pair
                    .split_once('=')
                    .with_context(|| format!("expected key=value, got '{}'", pair))?;
                call.values.insert(key.trim().to_string(), json!(value));
            }
            if !credential.channel_code.is_empty() && !call.values.contains_key("channelCode") {
                call.values
                    .insert("channelCode".into(), json!(credential.channel_code));
            }

            let secret = Some(credential.secret_key.as_str()).filter(|s| !s.is_empty());
            let response = client.call_template(template, &call, secret).await?;
            println!("HTTP {}", response.status);
            if let Some(code) = response.body.result_code() {
                println!("{}", ehub_pay::classify(&code).banner());
            }
            println!("{}", response.body.as_text());
        }
        other => bail!("unknown command '{}'", other),
    }

    Ok(())
}

fn arg<'a>(args: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    args.get(index)
        .map(String::as_str)
        .with_context(|| format!("missing argument <{}>", name))
}
