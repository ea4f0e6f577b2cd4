//! In-memory board: scripted WiFi, time, HTTP and a text LCD.
//!
//! Backs the host simulator binary and the test suites. Every handle is a
//! cheap clone sharing state with the original, so a caller can keep one
//! copy for inspection after moving the other into a [`Device`].
//!
//! [`Device`]: crate::controller::Device

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use crate::error::{DisplayError, HttpError, LinkError, TimeSyncError};
use crate::hal::{Board, CharDisplay, Clock, HttpClient, HttpResponse, NetworkTime, WifiLink};

pub struct SimBoard;

impl Board for SimBoard {
    type Display = SimDisplay;
    type Wifi = SimWifi;
    type Time = SimNtp;
    type Http = SimHttp;
    type Clock = ManualClock;
}

// ── Display ─────────────────────────────────────────────────────────

struct DisplayState {
    columns: usize,
    cells: Vec<Vec<char>>,
    cursor: (usize, usize),
    clears: usize,
    faulty: bool,
    writes: Vec<String>,
}

#[derive(Clone)]
pub struct SimDisplay {
    state: Rc<RefCell<DisplayState>>,
}

impl SimDisplay {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            state: Rc::new(RefCell::new(DisplayState {
                columns,
                cells: vec![vec![' '; columns]; rows],
                cursor: (0, 0),
                clears: 0,
                faulty: false,
                writes: Vec::new(),
            })),
        }
    }

    pub fn row(&self, row: usize) -> String {
        self.state.borrow().cells[row].iter().collect()
    }

    pub fn clear_count(&self) -> usize {
        self.state.borrow().clears
    }

    /// Every string written since creation, in order.
    pub fn writes(&self) -> Vec<String> {
        self.state.borrow().writes.clone()
    }

    pub fn has_written(&self, needle: &str) -> bool {
        self.state.borrow().writes.iter().any(|w| w.contains(needle))
    }

    pub fn set_faulty(&self, faulty: bool) {
        self.state.borrow_mut().faulty = faulty;
    }

    fn check(&self) -> Result<(), DisplayError> {
        if self.state.borrow().faulty {
            Err(DisplayError::Bus("simulated bus fault".into()))
        } else {
            Ok(())
        }
    }
}

impl CharDisplay for SimDisplay {
    fn columns(&self) -> usize {
        self.state.borrow().columns
    }

    fn rows(&self) -> usize {
        self.state.borrow().cells.len()
    }

    fn clear(&mut self) -> Result<(), DisplayError> {
        self.check()?;
        let mut s = self.state.borrow_mut();
        for row in s.cells.iter_mut() {
            row.fill(' ');
        }
        s.cursor = (0, 0);
        s.clears += 1;
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), DisplayError> {
        self.check()?;
        let mut s = self.state.borrow_mut();
        if col as usize >= s.columns || row as usize >= s.cells.len() {
            return Err(DisplayError::CursorOutOfRange { col, row });
        }
        s.cursor = (col as usize, row as usize);
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), DisplayError> {
        self.check()?;
        let mut s = self.state.borrow_mut();
        let (mut col, row) = s.cursor;
        let columns = s.columns;
        for ch in text.chars() {
            // Past the last column the characters fall off the panel.
            if col < columns {
                s.cells[row][col] = ch;
            }
            col += 1;
        }
        s.cursor = (col, row);
        s.writes.push(text.to_string());
        Ok(())
    }
}

// ── Clock ───────────────────────────────────────────────────────────

struct ClockState {
    unix_base: i64,
    uptime: Duration,
    sleeps: Vec<Duration>,
}

/// Clock that only moves when slept on or advanced explicitly.
#[derive(Clone)]
pub struct ManualClock {
    state: Rc<RefCell<ClockState>>,
}

impl ManualClock {
    pub fn new(unix_time: i64) -> Self {
        Self {
            state: Rc::new(RefCell::new(ClockState {
                unix_base: unix_time,
                uptime: Duration::ZERO,
                sleeps: Vec::new(),
            })),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.state.borrow_mut().uptime += by;
    }

    /// Step the wall clock, as a time sync would. Uptime is unaffected.
    pub fn set_unix_time(&self, unix_time: i64) {
        let mut s = self.state.borrow_mut();
        s.unix_base = unix_time - s.uptime.as_secs() as i64;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.state.borrow().sleeps.clone()
    }
}

impl Clock for ManualClock {
    fn unix_time(&self) -> i64 {
        let s = self.state.borrow();
        s.unix_base + s.uptime.as_secs() as i64
    }

    fn uptime(&self) -> Duration {
        self.state.borrow().uptime
    }

    fn sleep(&mut self, duration: Duration) {
        let mut s = self.state.borrow_mut();
        s.uptime += duration;
        s.sleeps.push(duration);
    }
}

// ── WiFi ────────────────────────────────────────────────────────────

struct WifiState {
    link_on_poll: Option<u32>,
    polls: u32,
    requested: bool,
    up: bool,
    activations: u32,
    connect_requests: u32,
    fail_activation: bool,
}

#[derive(Clone)]
pub struct SimWifi {
    state: Rc<RefCell<WifiState>>,
}

impl SimWifi {
    /// Link comes up on the `poll`-th status check after a connect request.
    pub fn connecting_on_poll(poll: u32) -> Self {
        Self::with(Some(poll))
    }

    pub fn unreachable() -> Self {
        Self::with(None)
    }

    fn with(link_on_poll: Option<u32>) -> Self {
        Self {
            state: Rc::new(RefCell::new(WifiState {
                link_on_poll,
                polls: 0,
                requested: false,
                up: false,
                activations: 0,
                connect_requests: 0,
                fail_activation: false,
            })),
        }
    }

    pub fn fail_activation(&self) {
        self.state.borrow_mut().fail_activation = true;
    }

    /// Drop the link. It stays down until a new connect request, which then
    /// comes up on the `poll`-th status check, if given.
    pub fn drop_link(&self, reconnect_on_poll: Option<u32>) {
        let mut s = self.state.borrow_mut();
        s.up = false;
        s.requested = false;
        s.polls = 0;
        s.link_on_poll = reconnect_on_poll;
    }

    pub fn polls(&self) -> u32 {
        self.state.borrow().polls
    }

    pub fn connect_requests(&self) -> u32 {
        self.state.borrow().connect_requests
    }

    pub fn activations(&self) -> u32 {
        self.state.borrow().activations
    }
}

impl WifiLink for SimWifi {
    fn activate(&mut self) -> Result<(), LinkError> {
        let mut s = self.state.borrow_mut();
        if s.fail_activation {
            return Err(LinkError::Driver("radio did not start".into()));
        }
        s.activations += 1;
        Ok(())
    }

    fn connect(&mut self, _ssid: &str, _passphrase: &str) -> Result<(), LinkError> {
        let mut s = self.state.borrow_mut();
        s.connect_requests += 1;
        s.requested = true;
        s.polls = 0;
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        let mut s = self.state.borrow_mut();
        if s.up {
            return true;
        }
        if !s.requested {
            return false;
        }
        s.polls += 1;
        if s.link_on_poll.is_some_and(|n| s.polls >= n) {
            s.up = true;
        }
        s.up
    }

    fn ip_address(&mut self) -> Option<String> {
        self.state.borrow().up.then(|| "192.168.1.50".to_string())
    }
}

// ── Network time ────────────────────────────────────────────────────

struct NtpState {
    fail_first: u32,
    attempts: u32,
    target: Option<(ManualClock, i64)>,
}

#[derive(Clone)]
pub struct SimNtp {
    state: Rc<RefCell<NtpState>>,
}

impl SimNtp {
    pub fn failing() -> Self {
        Self::with(u32::MAX, None)
    }

    /// Fails `fail_first` times, then sets `clock` to `unix_time`.
    pub fn succeeding_after(fail_first: u32, clock: &ManualClock, unix_time: i64) -> Self {
        Self::with(fail_first, Some((clock.clone(), unix_time)))
    }

    fn with(fail_first: u32, target: Option<(ManualClock, i64)>) -> Self {
        Self {
            state: Rc::new(RefCell::new(NtpState {
                fail_first,
                attempts: 0,
                target,
            })),
        }
    }

    pub fn attempts(&self) -> u32 {
        self.state.borrow().attempts
    }
}

impl NetworkTime for SimNtp {
    fn set_time(&mut self) -> Result<(), TimeSyncError> {
        let mut s = self.state.borrow_mut();
        s.attempts += 1;
        if s.attempts <= s.fail_first {
            return Err(TimeSyncError::Unavailable("no reply from time server".into()));
        }
        match &s.target {
            Some((clock, unix_time)) => {
                clock.set_unix_time(*unix_time);
                Ok(())
            }
            None => Err(TimeSyncError::Unavailable("no reply from time server".into())),
        }
    }
}

// ── HTTP ────────────────────────────────────────────────────────────

struct Route {
    prefix: String,
    responses: VecDeque<Result<HttpResponse, HttpError>>,
}

struct HttpState {
    routes: Vec<Route>,
    requests: Vec<String>,
}

/// HTTP client answering from per-URL-prefix queues. The last queued
/// answer of a route repeats forever.
#[derive(Clone)]
pub struct SimHttp {
    state: Rc<RefCell<HttpState>>,
}

impl Default for SimHttp {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHttp {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(HttpState {
                routes: Vec::new(),
                requests: Vec::new(),
            })),
        }
    }

    /// Queue an answer for requests whose URL starts with `prefix`.
    pub fn on(&self, prefix: &str, response: Result<HttpResponse, HttpError>) -> &Self {
        let mut s = self.state.borrow_mut();
        match s.routes.iter_mut().find(|r| r.prefix == prefix) {
            Some(route) => route.responses.push_back(response),
            None => s.routes.push(Route {
                prefix: prefix.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.state.borrow().requests.clone()
    }

    pub fn request_count(&self, prefix: &str) -> usize {
        self.state
            .borrow()
            .requests
            .iter()
            .filter(|u| u.starts_with(prefix))
            .count()
    }
}

impl HttpClient for SimHttp {
    fn get(&mut self, url: &str) -> Result<HttpResponse, HttpError> {
        let mut s = self.state.borrow_mut();
        s.requests.push(url.to_string());
        let route = s
            .routes
            .iter_mut()
            .find(|r| url.starts_with(&r.prefix))
            .ok_or_else(|| HttpError::Transport(format!("no route to {}", url)))?;
        if route.responses.len() > 1 {
            route
                .responses
                .pop_front()
                .unwrap_or_else(|| Err(HttpError::Transport("empty route".into())))
        } else {
            route
                .responses
                .front()
                .cloned()
                .unwrap_or_else(|| Err(HttpError::Transport("empty route".into())))
        }
    }
}
