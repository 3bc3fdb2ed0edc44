use std::env;

use anyhow::{Result, bail};
use ehub_pay::{Credential, PaymentClient, RequestOptions};

#[tokio::main]
async fn main() -> Result<()> {
    let student_id = env::args()
        .nth(1)
        .unwrap_or_else(|| "030740240067".to_string());

    let client = PaymentClient::new()?;
    let credential = Credential::new("DLC", "DLC@!2345");

    let response = client
        .get_bill_info(&credential, &student_id, None, &RequestOptions::default())
        .await?;

    let classification = response.classification();
    if !classification.is_success() {
        bail!("{}", classification.banner());
    }

    if let Some(bill) = response.bill() {
        println!("Student: {} ({})", bill.student_name, bill.student_id);
        println!("Bill:    {}", bill.id);
        println!("  {}", bill.description);
        println!("  Amount: {}", bill.debt_amount);
    }

    Ok(())
}
