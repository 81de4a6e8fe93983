//! Batch partitioning and bounded parallel rendering

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::contact::Contact;
use crate::render::{RenderContext, RenderError, Renderer};

/// Split `items` into consecutive chunks of `size`, preserving order.
///
/// Every chunk is full except possibly the last; a zero size is treated
/// as one.
pub fn partition<T>(items: &[T], size: usize) -> Vec<&[T]> {
    items.chunks(size.max(1)).collect()
}

/// Number of batches `partition` produces for `len` items
pub fn batch_count(len: usize, size: usize) -> usize {
    len.div_ceil(size.max(1))
}

/// A contact paired with its render result
#[derive(Debug)]
pub struct Rendered {
    pub contact: Contact,
    pub html: Result<String, RenderError>,
}

/// Render one contact on a blocking thread.
///
/// A panicking renderer surfaces as `RenderError::Aborted` instead of
/// unwinding into the caller.
pub async fn render_one<R>(
    renderer: Arc<R>,
    contact: Contact,
    context: Arc<RenderContext>,
) -> Result<String, RenderError>
where
    R: Renderer + 'static,
{
    tokio::task::spawn_blocking(move || renderer.render(&contact, &context))
        .await
        .unwrap_or_else(|e| Err(RenderError::Aborted(e.to_string())))
}

/// Render every contact in `batch` with at most `workers` renders in flight.
///
/// Renders run on blocking threads; results come back in input order.
pub async fn render_all<R>(
    renderer: &Arc<R>,
    batch: &[Contact],
    context: &Arc<RenderContext>,
    workers: usize,
) -> Vec<Rendered>
where
    R: Renderer + 'static,
{
    let jobs: Vec<_> = batch
        .iter()
        .cloned()
        .map(|contact| {
            let renderer = Arc::clone(renderer);
            let context = Arc::clone(context);
            async move {
                let html = render_one(renderer, contact.clone(), context).await;
                Rendered { contact, html }
            }
        })
        .collect();

    stream::iter(jobs).buffered(workers.max(1)).collect().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_partition_sizes() {
        let items: Vec<u32> = (0..250).collect();
        let batches = partition(&items, 100);
        let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
        assert_eq!(batch_count(250, 100), 3);
    }

    #[test]
    fn test_partition_empty() {
        let items: Vec<u32> = Vec::new();
        assert!(partition(&items, 10).is_empty());
        assert_eq!(batch_count(0, 10), 0);
    }

    #[test]
    fn test_partition_zero_size_is_one() {
        let items = [1, 2, 3];
        assert_eq!(partition(&items, 0).len(), 3);
        assert_eq!(batch_count(3, 0), 3);
    }

    struct Counting {
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Renderer for Counting {
        fn render(&self, contact: &Contact, _ctx: &RenderContext) -> Result<String, RenderError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(5));
            self.active.fetch_sub(1, Ordering::SeqCst);
            if contact.email.starts_with("bad") {
                Err(RenderError::Template("boom".into()))
            } else {
                Ok(format!("<p>{}</p>", contact.email))
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_render_all_is_bounded_and_ordered() {
        let renderer = Arc::new(Counting {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let contacts: Vec<_> = (0..20)
            .map(|i| {
                if i == 7 {
                    Contact::new("bad@x.org")
                } else {
                    Contact::new(format!("user{i}@x.org"))
                }
            })
            .collect();

        let rendered =
            render_all(&renderer, &contacts, &Arc::new(RenderContext::default()), 3).await;

        assert_eq!(rendered.len(), 20);
        for (r, c) in rendered.iter().zip(&contacts) {
            assert_eq!(r.contact.email, c.email);
        }
        assert!(rendered[7].html.is_err());
        assert_eq!(rendered[0].html.as_deref().unwrap(), "<p>user0@x.org</p>");
        assert!(renderer.peak.load(Ordering::SeqCst) <= 3);
    }

    struct Panicking;

    impl Renderer for Panicking {
        fn render(&self, _contact: &Contact, _ctx: &RenderContext) -> Result<String, RenderError> {
            panic!("template engine crashed")
        }
    }

    #[tokio::test]
    async fn test_render_one_contains_panics() {
        let result = render_one(
            Arc::new(Panicking),
            Contact::new("a@x.org"),
            Arc::new(RenderContext::default()),
        )
        .await;
        assert!(matches!(result, Err(RenderError::Aborted(_))));
    }
}
