//! Simulated peripheral that fans out a counter characteristic to a set of
//! in-process peers.

#![allow(unused_crate_dependencies)]
#![allow(clippy::print_stdout)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use parking_lot::Mutex;
use structbuf::StructBuf;
use tokio::sync::mpsc;
use tracing::{info, Level};

use gatt_chr::att::Handle;
use gatt_chr::gatt::{
    Callbacks, Characteristic, Config, DescPerm, FmtType, Prop, Status, SubscribeEvent,
    NAMESPACE_SIG, UNITLESS,
};
use gatt_chr::host::{ConnHandle, Host, HostResult, EDONE, ENOTCONN};
use gatt_chr::{DescriptorUuid, Uuid16};

#[derive(Clone, Copy, Debug, clap::Parser)]
struct Args {
    /// Number of connected peers.
    #[arg(short, long, default_value_t = 2)]
    peers: u16,

    /// Negotiated ATT MTU of every peer.
    #[arg(short, long, default_value_t = 23)]
    mtu: u16,

    /// Number of updates to send.
    #[arg(short, long, default_value_t = 3)]
    count: u32,

    /// Use indications instead of notifications.
    #[arg(short, long)]
    indicate: bool,

    /// Delay before a peer confirms an indication, in milliseconds.
    #[arg(long, default_value_t = 50)]
    ack_ms: u64,

    /// Peer that never confirms indications.
    #[arg(long)]
    silent: Option<u16>,

    /// Indication confirmation timeout, in milliseconds.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,

    /// Log level.
    #[arg(short, long, default_value_t = Level::INFO)]
    level: Level,
}

/// PDU delivered to a simulated peer.
#[derive(Debug)]
struct Pdu {
    cn: ConnHandle,
    ind: bool,
    val: Vec<u8>,
}

#[derive(Debug)]
struct SimHost {
    mtu: Mutex<BTreeMap<ConnHandle, u16>>,
    tx: mpsc::UnboundedSender<Pdu>,
}

impl SimHost {
    fn send(&self, cn: ConnHandle, val: &StructBuf, ind: bool) -> HostResult {
        let val = val.as_ref().to_vec();
        (self.tx.send(Pdu { cn, ind, val })).map_err(|_| ENOTCONN)
    }
}

impl Host for SimHost {
    fn connected_count(&self) -> usize {
        self.mtu.lock().len()
    }

    fn peer_mtu(&self, cn: ConnHandle) -> u16 {
        self.mtu.lock().get(&cn).copied().unwrap_or_default()
    }

    fn send_notification(&self, cn: ConnHandle, _: Handle, val: StructBuf) -> HostResult {
        self.send(cn, &val, false)
    }

    fn send_indication(&self, cn: ConnHandle, _: Handle, val: StructBuf) -> HostResult {
        self.send(cn, &val, true)
    }
}

#[derive(Debug, Default)]
struct Counter(Mutex<u32>);

impl Callbacks for Counter {
    fn on_notify(&self, c: &Characteristic) {
        let mut n = self.0.lock();
        *n += 1;
        let _ = c.set_u32(*n);
    }

    fn on_status(&self, _: &Characteristic, s: Status, code: i32) {
        info!("Delivery status: {s} ({code})");
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt().with_max_level(args.level).init();

    let cfg = Config {
        indicate_timeout: Duration::from_millis(args.timeout_ms),
        ..Config::default()
    };
    let uuid = (Uuid16::new(0x2A56).ok_or_else(|| anyhow::anyhow!("invalid UUID")))?.as_uuid();
    let c = Arc::new(Characteristic::with_config(
        uuid,
        Prop::READ | Prop::NOTIFY | Prop::INDICATE,
        cfg,
    ));
    c.create_descriptor(
        DescriptorUuid::ClientCharacteristicConfiguration.uuid(),
        DescPerm::READ | DescPerm::WRITE,
        2,
    );
    let fmt = c.create_descriptor(
        DescriptorUuid::CharacteristicPresentationFormat.uuid(),
        DescPerm::READ,
        7,
    );
    fmt.set_format(FmtType::U32, 0, UNITLESS, NAMESPACE_SIG, 0);
    c.set_callbacks(Some(Arc::new(Counter::default()) as Arc<dyn Callbacks>));

    let (tx, rx) = mpsc::unbounded_channel();
    let host = Arc::new(SimHost {
        mtu: Mutex::default(),
        tx,
    });
    let hdl = Handle::new(0x0010).ok_or_else(|| anyhow::anyhow!("invalid handle"))?;
    c.register(hdl, Arc::clone(&host) as Arc<dyn Host>);
    println!("{c}");

    for i in 1..=args.peers {
        let cn = ConnHandle(i);
        host.mtu.lock().insert(cn, args.mtu);
        c.subscribe(SubscribeEvent {
            cn,
            notify: !args.indicate,
            indicate: args.indicate,
        });
    }
    let peers = tokio::spawn(run_peers(Arc::clone(&c), rx, args));

    for _ in 0..args.count {
        if args.indicate {
            c.indicate().await?;
        } else {
            c.notify().await?;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    for i in 1..=args.peers {
        c.disconnected(ConnHandle(i));
    }
    peers.abort();
    Ok(())
}

/// Receives PDUs on behalf of all peers and confirms indications.
async fn run_peers(c: Arc<Characteristic>, mut rx: mpsc::UnboundedReceiver<Pdu>, args: Args) {
    while let Some(pdu) = rx.recv().await {
        info!(
            "{} received {} {:02X?}",
            pdu.cn,
            if pdu.ind { "indication" } else { "notification" },
            pdu.val
        );
        if !pdu.ind || args.silent == Some(pdu.cn.0) {
            continue;
        }
        let c = Arc::clone(&c);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(args.ack_ms)).await;
            c.indicate_status(pdu.cn, EDONE);
        });
    }
}
