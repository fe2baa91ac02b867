use std::rc::Rc;
use std::thread::JoinHandle;

use pdf_form_overlay::*;
use tokio::sync::mpsc;
use tokio::task::LocalSet;

use crate::{FormCommand, FormUpdate, PageImage};

type PageOf<B> = <<B as Backend>::Document as DocumentHandle>::Page;

/// Results of work spawned off the command loop
enum Completion<B: Backend> {
    Opened {
        generation: Generation,
        result: Result<B::Document>,
    },
    PagesLoaded {
        generation: Generation,
        result: Result<Vec<PageEntry<PageOf<B>>>>,
    },
    Saved {
        outcome: SaveOutcome,
    },
}

struct Worker<B: Backend, S, T> {
    viewer: FormViewer<B>,
    backend: Rc<B>,
    sink: Rc<S>,
    printer: T,
    update_tx: mpsc::UnboundedSender<FormUpdate>,
    completion_tx: mpsc::UnboundedSender<Completion<B>>,
}

/// Async worker task that drives a [`FormViewer`] from UI commands.
///
/// Loads and saves are spawned as local tasks, so this must run inside a
/// [`LocalSet`]. Commands keep being handled while they are in flight.
pub async fn worker_task<B, S, T>(
    backend: B,
    options: ViewerOptions,
    sink: S,
    printer: T,
    mut command_rx: mpsc::UnboundedReceiver<FormCommand>,
    update_tx: mpsc::UnboundedSender<FormUpdate>,
) where
    B: Backend + 'static,
    B::Document: 'static,
    PageOf<B>: 'static,
    S: SaveSink + 'static,
    T: PrintTarget,
{
    let viewer = match FormViewer::new(options) {
        Ok(viewer) => viewer,
        Err(e) => {
            let _ = update_tx.send(FormUpdate::Error {
                message: format!("Failed to initialize viewer: {}", e),
            });
            return;
        }
    };

    let (completion_tx, mut completion_rx) = mpsc::unbounded_channel();
    let mut worker = Worker {
        viewer,
        backend: Rc::new(backend),
        sink: Rc::new(sink),
        printer,
        update_tx,
        completion_tx,
    };

    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(cmd) => worker.process_command(cmd, &mut command_rx).await,
                None => break,
            },
            Some(done) = completion_rx.recv() => worker.complete(done).await,
        }
    }
    log::debug!("Command channel closed, worker exiting");
}

/// Run [`worker_task`] on a dedicated thread with a current-thread runtime.
/// `make` builds the backend, save sink and print target on that thread.
pub fn spawn_worker_thread<B, S, T, F>(
    make: F,
    options: ViewerOptions,
    command_rx: mpsc::UnboundedReceiver<FormCommand>,
    update_tx: mpsc::UnboundedSender<FormUpdate>,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() -> (B, S, T) + Send + 'static,
    B: Backend + 'static,
    B::Document: 'static,
    PageOf<B>: 'static,
    S: SaveSink + 'static,
    T: PrintTarget + 'static,
{
    std::thread::Builder::new()
        .name("pdf-form-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    let _ = update_tx.send(FormUpdate::Error {
                        message: format!("Failed to start worker runtime: {}", e),
                    });
                    return;
                }
            };
            let (backend, sink, printer) = make();
            let local = LocalSet::new();
            local.block_on(
                &runtime,
                worker_task(backend, options, sink, printer, command_rx, update_tx),
            );
        })
}

impl<B, S, T> Worker<B, S, T>
where
    B: Backend + 'static,
    B::Document: 'static,
    PageOf<B>: 'static,
    S: SaveSink + 'static,
    T: PrintTarget,
{
    fn send(&self, update: FormUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn send_error(&self, message: String) {
        self.send(FormUpdate::Error { message });
    }

    async fn process_command(
        &mut self,
        cmd: FormCommand,
        command_rx: &mut mpsc::UnboundedReceiver<FormCommand>,
    ) {
        match cmd {
            FormCommand::Open { source } => {
                let request = self.viewer.set_source(source);
                self.send(FormUpdate::Loading {
                    generation: request.generation,
                });
                self.spawn_open(request);
            }
            FormCommand::Close => {
                self.viewer.close();
                self.send(FormUpdate::Closed);
            }
            FormCommand::ZoomIn => {
                if self.viewer.zoom_in() {
                    self.zoom_changed();
                    self.render().await;
                }
            }
            FormCommand::ZoomOut => {
                if self.viewer.zoom_out() {
                    self.zoom_changed();
                    self.render().await;
                }
            }
            FormCommand::Resize {
                mut container_width,
            } => {
                // Drain queued resizes, keeping only the most recent
                while let Ok(next_cmd) = command_rx.try_recv() {
                    if let FormCommand::Resize {
                        container_width: newer,
                    } = next_cmd
                    {
                        log::debug!("Discarding queued resize, using newer width");
                        container_width = newer;
                    } else {
                        Box::pin(self.process_command(next_cmd, command_rx)).await;
                    }
                }

                if self.viewer.resize(container_width) {
                    self.zoom_changed();
                    self.render().await;
                }
            }
            FormCommand::SetText { id, text } => {
                if let Err(e) = self.viewer.controls_mut().set_text(id, text) {
                    self.send_error(e.to_string());
                }
            }
            FormCommand::SetChecked { id, checked } => {
                if let Err(e) = self.viewer.controls_mut().set_checked(id, checked) {
                    self.send_error(e.to_string());
                }
            }
            FormCommand::Select { id, export_value } => {
                if let Err(e) = self.viewer.controls_mut().select(id, &export_value) {
                    self.send_error(e.to_string());
                }
            }
            FormCommand::Snapshot => {
                self.send(FormUpdate::FormFields {
                    values: self.viewer.form_fields(),
                });
            }
            FormCommand::Save => self.start_save(),
            FormCommand::Print => match self.viewer.print(&self.printer).await {
                Ok(()) => self.send(FormUpdate::Printed {
                    pages: self.viewer.page_count(),
                }),
                Err(e) => self.send_error(format!("Failed to print: {}", e)),
            },
        }
    }

    async fn complete(&mut self, done: Completion<B>) {
        match done {
            Completion::Opened { generation, result } => {
                match self.viewer.document_opened(generation, result) {
                    Some(document) => self.spawn_page_load(generation, document),
                    None => self.report_failure(generation),
                }
            }
            Completion::PagesLoaded { generation, result } => {
                if self.viewer.pages_loaded(generation, result) {
                    self.send(FormUpdate::Loaded {
                        page_count: self.viewer.page_count(),
                        controls: self.viewer.controls().iter().cloned().collect(),
                    });
                    self.zoom_changed();
                    self.render().await;
                } else {
                    self.report_failure(generation);
                }
            }
            Completion::Saved { outcome } => {
                self.viewer.finish_save(&outcome);
                self.send(FormUpdate::SaveFinished { outcome });
            }
        }
    }

    /// Surface a load failure of the current generation; stale ones are silent
    fn report_failure(&self, generation: Generation) {
        if generation != self.viewer.generation() {
            return;
        }
        if let ViewerState::Failed(message) = self.viewer.state() {
            self.send_error(message.clone());
        }
    }

    fn spawn_open(&self, request: OpenRequest) {
        let backend = Rc::clone(&self.backend);
        let completion_tx = self.completion_tx.clone();
        tokio::task::spawn_local(async move {
            let result = backend.open(&request.source, &request.worker).await;
            let _ = completion_tx.send(Completion::Opened {
                generation: request.generation,
                result,
            });
        });
    }

    fn spawn_page_load(&self, generation: Generation, document: Rc<B::Document>) {
        let completion_tx = self.completion_tx.clone();
        tokio::task::spawn_local(async move {
            let result = load_page_entries(document.as_ref()).await;
            let _ = completion_tx.send(Completion::PagesLoaded { generation, result });
        });
    }

    fn start_save(&mut self) {
        let job = match self.viewer.begin_save() {
            Ok(job) => job,
            Err(FormError::SaveInProgress) => {
                log::debug!("Save already running, ignoring request");
                return;
            }
            Err(e) => {
                self.send_error(e.to_string());
                return;
            }
        };
        self.send(FormUpdate::SaveStarted {
            file_name: job.file_name().to_string(),
        });

        let backend = Rc::clone(&self.backend);
        let sink = Rc::clone(&self.sink);
        let completion_tx = self.completion_tx.clone();
        tokio::task::spawn_local(async move {
            let outcome = job.run(backend.as_ref(), sink.as_ref()).await;
            let _ = completion_tx.send(Completion::Saved { outcome });
        });
    }

    fn zoom_changed(&self) {
        let zoom = self.viewer.zoom();
        self.send(FormUpdate::ZoomChanged {
            scale: zoom.scale(),
            can_zoom_in: zoom.can_zoom_in(),
            can_zoom_out: zoom.can_zoom_out(),
        });
    }

    async fn render(&mut self) {
        let report = match self.viewer.render().await {
            Ok(report) => report,
            Err(e) => {
                log::debug!("Render pass skipped: {}", e);
                return;
            }
        };

        // Failed pages show blank paper but keep their controls
        let mut pages: Vec<usize> = report
            .rendered
            .iter()
            .copied()
            .chain(report.failed.iter().map(|(number, _)| *number))
            .collect();
        pages.sort_unstable();

        for page_number in pages {
            let Some(surface) = self.viewer.surface(page_number) else {
                continue;
            };
            self.send(FormUpdate::PageRendered {
                page_number,
                scale: report.scale,
                image: PageImage {
                    pixel_width: surface.pixel_width,
                    pixel_height: surface.pixel_height,
                    css_width: surface.css_width,
                    css_height: surface.css_height,
                    rgba: surface.rgba.clone(),
                },
                overlays: self
                    .viewer
                    .overlays(page_number)
                    .into_iter()
                    .cloned()
                    .collect(),
            });
        }
        for (page_number, message) in &report.failed {
            self.send_error(format!("Failed to render page {}: {}", page_number, message));
        }
    }
}
