//! Recording fakes for the catalog, transport and raster seams, and a
//! scripted local HTTP server for the real clients.
use crate::catalog::{Catalog, GranuleDescriptor, GranuleQuery};
use crate::geometry::Geometry;
use crate::granule::{RasterBackend, RasterCube};
use crate::retrieve::Retriever;
use crate::transport::Transport;
use anyhow::{bail, Result};
use chrono::NaiveDate;
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use url::Url;

pub fn granule(id: &str) -> GranuleDescriptor {
    GranuleDescriptor {
        concept_id: format!("G-{id}"),
        native_id: id.to_string(),
        data_links: vec![Url::parse(&format!("https://example.com/{id}.nc")).unwrap()],
        begin: None,
    }
}

pub fn retriever(
    catalog: FakeCatalog,
    download_directory: &Path,
) -> Retriever<FakeCatalog, FakeTransport, FakeBackend> {
    Retriever::new(catalog, FakeTransport::default(), FakeBackend::default())
        .with_download_directory(download_directory)
}

enum Responses {
    Always(Vec<GranuleDescriptor>),
    ByDate(Vec<(NaiveDate, Vec<GranuleDescriptor>)>),
}

pub struct FakeCatalog {
    responses: Responses,
    queries: RefCell<Vec<GranuleQuery>>,
}

impl FakeCatalog {
    pub fn always(granules: Vec<GranuleDescriptor>) -> Self {
        Self {
            responses: Responses::Always(granules),
            queries: RefCell::new(vec![]),
        }
    }

    /// Answers with the granules listed for the query's start date, or
    /// nothing for dates not listed.
    pub fn by_date(granules: Vec<(NaiveDate, Vec<GranuleDescriptor>)>) -> Self {
        Self {
            responses: Responses::ByDate(granules),
            queries: RefCell::new(vec![]),
        }
    }

    pub fn queries(&self) -> Vec<GranuleQuery> {
        self.queries.borrow().clone()
    }
}

impl Catalog for FakeCatalog {
    async fn search(self: &Self, query: &GranuleQuery) -> Result<Vec<GranuleDescriptor>> {
        self.queries.borrow_mut().push(query.clone());
        let granules = match &self.responses {
            Responses::Always(granules) => granules.clone(),
            Responses::ByDate(by_date) => by_date
                .iter()
                .find(|(date, _)| *date == query.start.date())
                .map(|(_, granules)| granules.clone())
                .unwrap_or_default(),
        };
        Ok(granules)
    }
}

#[derive(Default)]
pub struct FakeTransport {
    downloads: Cell<usize>,
    fail: bool,
}

impl FakeTransport {
    pub fn failing() -> Self {
        Self {
            downloads: Cell::new(0),
            fail: true,
        }
    }

    pub fn downloads(&self) -> usize {
        self.downloads.get()
    }
}

impl Transport for FakeTransport {
    async fn download(
        self: &Self,
        granule: &GranuleDescriptor,
        directory: &Path,
    ) -> Result<PathBuf> {
        if self.fail {
            bail!("connection reset while fetching {}", granule.native_id);
        }
        self.downloads.set(self.downloads.get() + 1);
        fs::create_dir_all(directory)?;
        let path = directory.join(granule.file_name());
        fs::write(&path, granule.native_id.as_bytes())?;
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Read {
    pub path: PathBuf,
    pub geometry: Geometry,
    pub quality_bands: Vec<usize>,
}

#[derive(Default)]
pub struct FakeBackend {
    reads: RefCell<Vec<Read>>,
    mosaics: RefCell<Vec<usize>>,
    writes: Rc<Cell<usize>>,
    fail_on: Option<String>,
}

impl FakeBackend {
    /// Fails to read the granule stored under `file_name`.
    pub fn failing_on(file_name: &str) -> Self {
        Self {
            fail_on: Some(file_name.to_string()),
            ..Self::default()
        }
    }

    pub fn reads(&self) -> Vec<Read> {
        self.reads.borrow().clone()
    }

    /// Number of cubes handed to each mosaic call.
    pub fn mosaic_inputs(&self) -> Vec<usize> {
        self.mosaics.borrow().clone()
    }

    /// Number of cubes written to disk.
    pub fn writes(&self) -> usize {
        self.writes.get()
    }
}

impl RasterBackend for FakeBackend {
    type Cube = FakeCube;

    fn reflectance(
        self: &Self,
        path: &Path,
        geometry: &Geometry,
        quality_bands: &[usize],
    ) -> Result<FakeCube> {
        self.reads.borrow_mut().push(Read {
            path: path.to_path_buf(),
            geometry: *geometry,
            quality_bands: quality_bands.to_vec(),
        });
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.fail_on.as_deref() == Some(file_name.as_str()) {
            bail!("unable to decode {}", path.display());
        }
        Ok(FakeCube {
            sources: vec![file_name],
            fail_write: false,
            writes: self.writes.clone(),
        })
    }

    fn mosaic(self: &Self, cubes: Vec<FakeCube>) -> Result<FakeCube> {
        self.mosaics.borrow_mut().push(cubes.len());
        Ok(FakeCube {
            sources: cubes.into_iter().flat_map(|c| c.sources).collect(),
            fail_write: false,
            writes: self.writes.clone(),
        })
    }
}

#[derive(Debug)]
pub struct FakeCube {
    pub sources: Vec<String>,
    fail_write: bool,
    writes: Rc<Cell<usize>>,
}

impl FakeCube {
    pub fn new(sources: Vec<String>) -> Self {
        Self {
            sources,
            fail_write: false,
            writes: Rc::default(),
        }
    }

    /// A cube whose write dies halfway, leaving a truncated file behind.
    pub fn failing() -> Self {
        Self {
            sources: vec![],
            fail_write: true,
            writes: Rc::default(),
        }
    }
}

impl RasterCube for FakeCube {
    fn to_file(self: &Self, path: &Path) -> Result<()> {
        if self.fail_write {
            fs::write(path, b"trunc")?;
            bail!("disk full writing {}", path.display());
        }
        fs::write(path, self.sources.join("\n"))?;
        self.writes.set(self.writes.get() + 1);
        Ok(())
    }
}

/// Client for [`LocalServer`]; proxies from the environment are ignored.
pub fn local_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// A canned HTTP/1.1 response.
pub struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Reply {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: vec![],
            body: body.into(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string()).header("Content-Type", "application/json")
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {} Reply\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// A request as received by [`LocalServer`].
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Answers one connection per scripted reply, in order.
pub struct LocalServer {
    listener: TcpListener,
    url: Url,
}

impl LocalServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
        Self { listener, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn serve(self, replies: Vec<Reply>) -> Arc<Mutex<Vec<Request>>> {
        let requests = Arc::new(Mutex::new(vec![]));
        let recorded = requests.clone();
        tokio::spawn(async move {
            for reply in replies {
                let (mut socket, _) = self.listener.accept().await.unwrap();
                let request = read_request(&mut socket).await;
                recorded.lock().unwrap().push(request);
                socket.write_all(&reply.to_bytes()).await.unwrap();
                let _ = socket.shutdown().await;
            }
        });
        requests
    }
}

async fn read_request(socket: &mut TcpStream) -> Request {
    let mut buffer = vec![];
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "Connection closed before the request headers");
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..header_end]).to_string();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split(' ');
    let method = request_line.next().unwrap_or_default().to_string();
    let target = request_line.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.parse::<usize>().ok())
        .unwrap_or(0);
    while buffer.len() < header_end + content_length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "Connection closed before the request body");
        buffer.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buffer[header_end..header_end + content_length]).to_string();

    Request {
        method,
        target,
        headers,
        body,
    }
}
