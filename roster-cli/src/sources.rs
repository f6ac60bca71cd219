//! Collaborator selection from `config.yaml`.

use std::path::Path;

use roster_core::config::{self, ActivitySource, RosterConfig, SourceKind};
use roster_core::paths::templates_dir_at;
use roster_core::properties::{FileProperties, PropertyKey, PropertyStore};
use roster_google::{AdminDirectory, DriveActivity, DriveDocument, GoogleClient, PeopleContacts};
use roster_renderer::{OutputFormat, Renderer};
use roster_sync::{
    pipeline, AlterationSignal, Collaborators, Contacts, Directory, FileActivity, FileDocument,
    RosterSink, RunOptions, RunOutcome, Snapshot, SyncError,
};

enum Backend {
    Snapshot(Snapshot),
    Google {
        directory: AdminDirectory,
        contacts: PeopleContacts,
    },
}

/// Directory, contacts and alteration signal for one run.
pub struct Sources {
    backend: Backend,
    activity: Box<dyn AlterationSignal>,
}

impl Sources {
    pub fn from_config(config: &RosterConfig, home: &Path) -> Result<Self, SyncError> {
        let (backend, client) = match config.source {
            SourceKind::Snapshot => {
                let path = config.snapshot_path_at(home).ok_or_else(|| {
                    SyncError::Config("source is `snapshot` but no snapshot_path is set".into())
                })?;
                (Backend::Snapshot(Snapshot::load(&path)?), None)
            }
            SourceKind::Google => {
                let client = GoogleClient::from_config(config)?;
                let backend = Backend::Google {
                    directory: AdminDirectory::new(client.clone()),
                    contacts: PeopleContacts::new(client.clone()),
                };
                (backend, Some(client))
            }
        };

        let activity: Box<dyn AlterationSignal> = match config.document.activity {
            ActivitySource::File => Box::new(FileActivity),
            ActivitySource::Drive => {
                let client = match client {
                    Some(client) => client,
                    None => GoogleClient::from_config(config)?,
                };
                Box::new(DriveActivity::new(client))
            }
        };

        Ok(Self { backend, activity })
    }

    pub fn directory(&self) -> &dyn Directory {
        match &self.backend {
            Backend::Snapshot(snapshot) => snapshot,
            Backend::Google { directory, .. } => directory,
        }
    }

    pub fn contacts(&self) -> &dyn Contacts {
        match &self.backend {
            Backend::Snapshot(snapshot) => snapshot,
            Backend::Google { contacts, .. } => contacts,
        }
    }

    pub fn activity(&self) -> &dyn AlterationSignal {
        self.activity.as_ref()
    }
}

/// Local render target, with template overrides from `~/.roster/templates/`.
fn open_document(config: &RosterConfig, home: &Path) -> Result<FileDocument, SyncError> {
    FileDocument::open(config.document_path_at(home), Some(&templates_dir_at(home)))
}

/// Render target paired with the configured alteration signal: the local
/// file for `file` activity, the Drive file named by `DOCUMENT_ID` for
/// `drive` activity.
pub fn open_sink(
    config: &RosterConfig,
    home: &Path,
    properties: &dyn PropertyStore,
) -> Result<Box<dyn RosterSink>, SyncError> {
    let drive = match config.document.activity {
        ActivitySource::File => None,
        ActivitySource::Drive => Some(GoogleClient::from_config(config)?),
    };
    sink_for(config, home, properties, drive)
}

fn sink_for(
    config: &RosterConfig,
    home: &Path,
    properties: &dyn PropertyStore,
    drive: Option<GoogleClient>,
) -> Result<Box<dyn RosterSink>, SyncError> {
    let Some(client) = drive else {
        return Ok(Box::new(open_document(config, home)?));
    };
    let file_id = properties.get(PropertyKey::DocumentId).ok_or_else(|| {
        SyncError::Config(format!(
            "{} property is required for drive activity",
            PropertyKey::DocumentId
        ))
    })?;
    let renderer = Renderer::with_templates(Some(&templates_dir_at(home)))?;
    let format = OutputFormat::from_path(&config.document.path);
    Ok(Box::new(DriveDocument::new(client, file_id, format, renderer)))
}

/// Load config and state under `home` and run the pipeline once.
pub fn run_once(home: &Path, options: RunOptions) -> Result<RunOutcome, SyncError> {
    let config = config::load_at(home)?;
    let sources = Sources::from_config(&config, home)?;
    let mut properties = FileProperties::load_at(home)?;
    let mut sink = open_sink(&config, home, &properties)?;

    pipeline::run(
        &config,
        Collaborators {
            directory: sources.directory(),
            contacts: sources.contacts(),
            activity: sources.activity(),
            properties: &mut properties,
            sink: sink.as_mut(),
        },
        options,
    )
}
