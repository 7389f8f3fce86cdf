//! First-in-graph demo module. It has no inputs; a real detector would
//! read frames from `in/data` instead of fabricating them.

use std::future::Future;
use std::pin::Pin;

use stagehand_module::{Module, ModuleContext, ModuleError};
use stagehand_sidecar::{Event, Insight};

pub struct FaceDetect;

impl Module for FaceDetect {
    fn process<'a>(
        &'a self,
        ctx: &'a ModuleContext,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModuleError>> + Send + 'a>> {
        Box::pin(async move {
            for i in 0..5 {
                let name = format!("image{i}.png");
                ctx.exchange().write_file(&name, b"face!").await?;
                tracing::info!(file = %name, "wrote detection");

                // One event per file: each detection can trigger its own
                // downstream stage.
                ctx.publish(&Event::new("face_detected").with_file(&name))
                    .await?;
            }

            ctx.exchange()
                .write_insight(
                    &Insight::new()
                        .with("source", "facebook")
                        .with("imageDimensions", "1080x1024")
                        .with("imageMD5", "1a79a4d60de6718e8e5b326e338ae533"),
                )
                .await?;
            Ok(())
        })
    }
}
