//! Demonstrates an upload route consulting the admission controller before writing a file,
//! translating rejections into HTTP 429 with a JSON error body.

// crates.io
use color_eyre::Result;
use serde_json::{Value, json};
use time::Duration;
// self
use upload_admission::{Admission, AdmissionController, PrincipalKey, QuotaPolicy};

struct UploadRequest<'a> {
	user_id: Option<&'a str>,
	file_name: &'a str,
	size: u64,
}

async fn handle_upload(
	controller: &AdmissionController,
	request: UploadRequest<'_>,
) -> Result<(u16, Value)> {
	let principal = PrincipalKey::from_user(request.user_id)?;

	match controller.try_consume(&principal, request.size).await {
		Admission::Admitted(grant) => Ok((
			201,
			json!({
				"file": request.file_name,
				"remaining_bytes": grant.remaining,
			}),
		)),
		Admission::Rejected(rejection) => Ok((429, serde_json::to_value(rejection.body())?)),
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let policy =
		QuotaPolicy::default().with_quota_bytes(5 * 1024 * 1024).with_window(Duration::HOUR);
	let controller = AdmissionController::new(policy)?;
	let sweeper = {
		let controller = controller.clone();

		tokio::spawn(async move { controller.run_sweeper(std::time::Duration::from_secs(300)).await })
	};
	let requests = [
		UploadRequest { user_id: Some("u1"), file_name: "cat.png", size: 3 * 1024 * 1024 },
		UploadRequest { user_id: Some("u1"), file_name: "dog.png", size: 3 * 1024 * 1024 },
		UploadRequest { user_id: None, file_name: "meme.gif", size: 4 * 1024 * 1024 },
		UploadRequest { user_id: None, file_name: "meme2.gif", size: 2 * 1024 * 1024 },
	];

	for request in requests {
		let who = request.user_id.unwrap_or(PrincipalKey::ANONYMOUS).to_owned();
		let (status, body) = handle_upload(&controller, request).await?;

		println!("{who}: {status} {body}");
	}

	println!(
		"admitted={} rejected={} bytes={}",
		controller.metrics().admitted(),
		controller.metrics().rejected(),
		controller.metrics().admitted_bytes()
	);

	sweeper.abort();

	Ok(())
}
