use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

/// `<device> on <mount point> type <fstype> (<options>)`, as printed by
/// util-linux `mount`.
static TYPED_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) on (.+) type (\S+)(?: \([^)]*\))?$").expect("mount line pattern is valid")
});

/// `<device> on <mount point> (<fstype>, <options>)`, as printed by BSD
/// and macOS `mount`.
static BSD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) on (.+) \(([^,)]+)[^)]*\)$").expect("mount line pattern is valid")
});

/// A single line of the system mount list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    pub device: String,
    pub mount_point: PathBuf,
    pub fstype: String,
}

/// Snapshot of the live mount list.
///
/// Built either from `/proc/self/mounts` or from the output of `mount`:
///
/// ```text
/// borgfs on /tmp/loft/test1/folder1/latest type fuse (ro,nosuid,nodev)
/// /dev/sdb1 on /run/media/alice/DISK 1 type vfat (rw,nosuid,nodev)
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    /// Parse `mount` output. Mount points may contain spaces.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .map(str::trim_end)
            .filter_map(|line| {
                let caps = TYPED_LINE.captures(line).or_else(|| BSD_LINE.captures(line))?;
                Some(MountEntry {
                    device: caps[1].to_string(),
                    mount_point: PathBuf::from(&caps[2]),
                    fstype: caps[3].to_string(),
                })
            })
            .collect();
        Self { entries }
    }

    /// Parse the kernel's `/proc/self/mounts`: whitespace-separated fields
    /// with octal escapes (`\040` for a space) inside them.
    pub fn parse_proc(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.split_whitespace();
                let device = fields.next()?;
                let mount_point = fields.next()?;
                let fstype = fields.next()?;
                Some(MountEntry {
                    device: unescape(device),
                    mount_point: PathBuf::from(unescape(mount_point)),
                    fstype: unescape(fstype),
                })
            })
            .collect();
        Self { entries }
    }

    /// Mount points of every entry carrying the backend's filesystem tag.
    pub fn mount_points(&self, tag: &str) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|e| Self::matches_tag(e, tag))
            .map(|e| e.mount_point.as_path())
            .collect()
    }

    /// Tagged mount points at or below `root`, deepest first so they can
    /// be unmounted in order.
    pub fn mounted_under(&self, tag: &str, root: &Path) -> Vec<PathBuf> {
        let mut points: Vec<PathBuf> = self
            .mount_points(tag)
            .into_iter()
            .filter(|p| p.starts_with(root))
            .map(Path::to_path_buf)
            .collect();
        points.sort_by_key(|p| std::cmp::Reverse(p.components().count()));
        points
    }

    /// Whether anything at all is mounted exactly at `path`.
    pub fn has_mount_point(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.mount_point == path)
    }

    /// FUSE filesystems name themselves after the program that serves
    /// them (`bup-fuse`, `borgfs`), either as the device or as the
    /// `fuse.<name>` subtype, so the tag is matched as a prefix of both.
    fn matches_tag(entry: &MountEntry, tag: &str) -> bool {
        let fstype = entry.fstype.strip_prefix("fuse.").unwrap_or(&entry.fstype);
        let device = Path::new(&entry.device)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&entry.device);
        fstype.starts_with(tag) || device.starts_with(tag)
    }
}

/// Decode the `\ooo` octal escapes the kernel uses for whitespace and
/// backslashes in mount fields.
fn unescape(field: &str) -> String {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\'
            && let Some(code) = bytes
                .get(i + 1..i + 4)
                .and_then(|d| std::str::from_utf8(d).ok())
                .and_then(|d| u8::from_str_radix(d, 8).ok())
        {
            out.push(code);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
/dev/nvme0n1p2 on / type ext4 (rw,relatime)
proc on /proc type proc (rw,nosuid,nodev,noexec,relatime)
borgfs on /tmp/loft/test1/folder1/latest type fuse (ro,nosuid,nodev,relatime)
borgfs on /tmp/loft/test1/folder2/latest type fuse (ro,nosuid,nodev,relatime)
bup on /tmp/loft/other type fuse.bup (ro,nosuid,nodev,relatime)
/dev/sdb1 on /run/media/alice/DISK1 type vfat (rw,nosuid,nodev)
";

    #[test]
    fn parses_device_mount_point_and_type() {
        let table = MountTable::parse(SAMPLE);
        assert_eq!(table.entries.len(), 6);
        assert_eq!(table.entries[2].device, "borgfs");
        assert_eq!(
            table.entries[2].mount_point,
            PathBuf::from("/tmp/loft/test1/folder1/latest")
        );
        assert_eq!(table.entries[4].fstype, "fuse.bup");
    }

    #[test]
    fn mount_points_may_contain_spaces() {
        let table = MountTable::parse(
            "borgfs on /home/al/my backups/test1/folder1/latest type fuse (ro)\n\
             /dev/sdc1 on /run/media/al/MY DISK type vfat (rw)\n",
        );
        assert_eq!(
            table.mounted_under("borgfs", Path::new("/home/al/my backups/test1")),
            vec![PathBuf::from("/home/al/my backups/test1/folder1/latest")]
        );
        assert!(table.has_mount_point(Path::new("/run/media/al/MY DISK")));
    }

    #[test]
    fn parses_bsd_style_lines() {
        let table = MountTable::parse(
            "/dev/disk1s1 on / (apfs, local, journaled)\n\
             borgfs@macfuse0 on /private/var/folders/x/loft/test1/folder1/latest (macfuse, nodev, nosuid)\n",
        );
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[0].fstype, "apfs");
        assert_eq!(
            table.mount_points("borgfs"),
            vec![Path::new("/private/var/folders/x/loft/test1/folder1/latest")]
        );
    }

    #[test]
    fn proc_mounts_are_unescaped() {
        let table = MountTable::parse_proc(
            "/dev/root / ext4 rw,relatime 0 0\n\
             bup-fuse /home/al/my\\040backups/test1 fuse.bup-fuse ro,nosuid 0 0\n",
        );
        assert_eq!(table.entries.len(), 2);
        assert_eq!(
            table.mounted_under("bup", Path::new("/home/al/my backups/test1")),
            vec![PathBuf::from("/home/al/my backups/test1")]
        );
    }

    #[test]
    fn unescape_keeps_plain_backslashes() {
        assert_eq!(unescape(r"a\040b\134c"), r"a b\c");
        assert_eq!(unescape(r"trailing\04"), r"trailing\04");
    }

    #[test]
    fn matches_tag_on_device_or_fstype() {
        let table = MountTable::parse(SAMPLE);
        assert_eq!(table.mount_points("borgfs").len(), 2);
        assert_eq!(
            table.mount_points("bup"),
            vec![Path::new("/tmp/loft/other")]
        );
        assert!(table.mount_points("atticfs").is_empty());
    }

    #[test]
    fn tag_matches_program_named_filesystems() {
        let table = MountTable::parse(
            "bup-fuse on /tmp/loft/test1 type fuse.bup-fuse (ro,nosuid,nodev)\n\
             /usr/lib/bup/cmd/bup-fuse on /tmp/loft/test2 type fuse (ro)\n",
        );
        assert_eq!(
            table.mount_points("bup"),
            vec![Path::new("/tmp/loft/test1"), Path::new("/tmp/loft/test2")]
        );
        assert!(table.mount_points("borgfs").is_empty());
    }

    #[test]
    fn trailing_slash_does_not_matter() {
        let table = MountTable::parse(SAMPLE);
        assert_eq!(
            table.mounted_under("bup", Path::new("/tmp/loft/other/")),
            vec![PathBuf::from("/tmp/loft/other")]
        );
        assert!(table.mounted_under("borgfs", Path::new("/tmp/loft/other")).is_empty());
    }

    #[test]
    fn mounted_under_is_deepest_first() {
        let text = "\
borgfs on /tmp/t type fuse (ro)
borgfs on /tmp/t/a/latest type fuse (ro)
borgfs on /tmp/tother type fuse (ro)
";
        let table = MountTable::parse(text);
        let points = table.mounted_under("borgfs", Path::new("/tmp/t"));
        assert_eq!(
            points,
            vec![PathBuf::from("/tmp/t/a/latest"), PathBuf::from("/tmp/t")]
        );
    }

    #[test]
    fn skips_short_lines() {
        let table = MountTable::parse("\n\nnonsense\n");
        assert!(table.entries.is_empty());
        assert!(MountTable::parse_proc("none\n").entries.is_empty());
    }
}
