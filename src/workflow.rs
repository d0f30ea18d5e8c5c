use crate::book::{self, BookPage};
use crate::compose::{compose_cover_prompt, compose_pages, ComposedPrompt};
use crate::config::Config;
use crate::imagen::{ImageClient, ImageOptions};
use crate::llm::LlmClient;
use crate::manuscript::parse_manuscript;
use crate::revalidate::revalidate_manuscript;
use crate::theme::{detect_theme, ThemeLabel};
use anyhow::{bail, Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, warn};
use std::fs;
use std::path::{Path, PathBuf};

const EXPECTED_PAGE_COUNT: usize = 16;

/// Turns a finished manuscript into a bound book: revalidate, parse and
/// compose, render illustrations, pack the EPUB. Everything staged under
/// `build/<slug>/` so an interrupted run resumes where it stopped.
pub struct BookBuilder {
    config: Config,
    llm: Box<dyn LlmClient>,
    images: Box<dyn ImageClient>,
}

impl BookBuilder {
    pub fn new(config: Config, llm: Box<dyn LlmClient>, images: Box<dyn ImageClient>) -> Self {
        Self {
            config,
            llm,
            images,
        }
    }

    pub async fn run(&self, manuscript: &str, profile: &str, title: &str) -> Result<PathBuf> {
        let theme = detect_theme(manuscript);
        println!("Detected theme: {}", theme);

        let manuscript = if self.config.revalidate {
            println!("Revalidating manuscript...");
            revalidate_manuscript(self.llm.as_ref(), manuscript, profile, theme).await
        } else {
            manuscript.to_string()
        };

        let slug = book::slugify(title);
        let build_dir = Path::new(&self.config.build_folder).join(&slug);
        fs::create_dir_all(&build_dir)?;
        fs::write(build_dir.join("manuscript.txt"), &manuscript)?;

        let prompts = self.load_or_compose_prompts(&build_dir, &manuscript, profile)?;

        println!("Rendering {} illustrations...", prompts.len());
        let page_images = self.render_pages(&build_dir, &prompts).await?;

        println!("Rendering cover...");
        let cover = self.render_cover(&build_dir, profile, theme).await?;

        let pages: Vec<BookPage> = prompts
            .iter()
            .zip(page_images)
            .map(|(prompt, image)| BookPage {
                number: prompt.page.order,
                text: prompt.page.page_text.clone(),
                image,
            })
            .collect();

        fs::create_dir_all(&self.config.output_folder)?;
        let output_path = Path::new(&self.config.output_folder).join(format!("{slug}.epub"));
        book::write_epub(&output_path, title, cover.as_deref(), &pages)?;

        println!("Book complete: {:?}", output_path);
        Ok(output_path)
    }

    /// Composed prompts are derived once per book and cached, so a resumed
    /// build renders against the same prompts it started with.
    fn load_or_compose_prompts(
        &self,
        build_dir: &Path,
        manuscript: &str,
        profile: &str,
    ) -> Result<Vec<ComposedPrompt>> {
        let prompts_path = build_dir.join("pages.json");
        if prompts_path.exists() {
            println!("Loading cached prompts from {:?}", prompts_path);
            let content = fs::read_to_string(&prompts_path)?;
            return serde_json::from_str(&content).context("Failed to parse cached pages.json");
        }

        let records = parse_manuscript(manuscript);
        if records.is_empty() {
            bail!("Manuscript contained no readable pages");
        }
        if records.len() != EXPECTED_PAGE_COUNT {
            warn!(
                "Manuscript parsed into {} pages, expected {}",
                records.len(),
                EXPECTED_PAGE_COUNT
            );
        }

        let prompts = compose_pages(records, profile);
        fs::write(&prompts_path, serde_json::to_string_pretty(&prompts)?)?;
        Ok(prompts)
    }

    async fn render_pages(
        &self,
        build_dir: &Path,
        prompts: &[ComposedPrompt],
    ) -> Result<Vec<Option<Vec<u8>>>> {
        let pb = ProgressBar::new(prompts.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
                .progress_chars("#>-"),
        );

        let images = self.images.as_ref();
        let opts = self.image_options();
        let opts = &opts;
        let concurrency = self.config.images.concurrency.max(1);

        let results: Vec<Result<(usize, Option<Vec<u8>>)>> =
            futures_util::stream::iter(prompts.iter())
                .map(|prompt| {
                    let pb = pb.clone();
                    async move {
                        let rendered = render_page(images, build_dir, prompt, opts).await;
                        pb.inc(1);
                        rendered
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

        pb.finish_with_message("Illustrations complete");

        let mut by_order: Vec<Option<Vec<u8>>> = vec![None; prompts.len()];
        for res in results {
            let (order, bytes) = res?;
            // Orders come from pages.json, which may be stale or hand-edited.
            let slot = order
                .checked_sub(1)
                .and_then(|i| by_order.get_mut(i))
                .with_context(|| {
                    format!(
                        "Page order {order} is out of range for {} prompts",
                        prompts.len()
                    )
                })?;
            *slot = bytes;
        }
        Ok(by_order)
    }

    async fn render_cover(
        &self,
        build_dir: &Path,
        profile: &str,
        theme: ThemeLabel,
    ) -> Result<Option<Vec<u8>>> {
        let cover_path = build_dir.join("cover.jpg");
        if cover_path.exists() {
            return Ok(Some(fs::read(&cover_path)?));
        }
        let failed_path = build_dir.join("cover.FAILED");
        if failed_path.exists() {
            return Ok(None);
        }

        let prompt = compose_cover_prompt(profile, theme);
        match self.images.generate(&prompt, &self.image_options()).await {
            Ok(bytes) => {
                fs::write(&cover_path, &bytes)?;
                Ok(Some(bytes))
            }
            Err(e) => {
                error!("Cover generation failed: {:#}", e);
                fs::write(&failed_path, format!("{e:#}"))?;
                Ok(None)
            }
        }
    }

    fn image_options(&self) -> ImageOptions {
        ImageOptions {
            count: 1,
            mime_type: self.config.images.output_mime.clone(),
            aspect_ratio: self.config.images.aspect_ratio.clone(),
        }
    }
}

// One page, at most one generation attempt per session: a cached image is
// reused, a recorded failure is not retried.
async fn render_page(
    images: &dyn ImageClient,
    build_dir: &Path,
    prompt: &ComposedPrompt,
    opts: &ImageOptions,
) -> Result<(usize, Option<Vec<u8>>)> {
    let order = prompt.page.order;
    let image_path = build_dir.join(format!("page_{:03}.jpg", order));
    if image_path.exists() {
        return Ok((order, Some(fs::read(&image_path)?)));
    }
    let failed_path = build_dir.join(format!("page_{:03}.FAILED", order));
    if failed_path.exists() {
        return Ok((order, None));
    }

    match images.generate(&prompt.final_prompt, opts).await {
        Ok(bytes) => {
            fs::write(&image_path, &bytes)?;
            Ok((order, Some(bytes)))
        }
        Err(e) => {
            error!("Image generation failed for page {}: {:#}", order, e);
            fs::write(&failed_path, format!("{e:#}"))?;
            Ok((order, None))
        }
    }
}
