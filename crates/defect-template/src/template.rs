//! Text the bot writes back to issues: body sections, comments and labels.

use crate::{
  error::{Error, Result},
  parse::AnalysisComment,
};

// ─── Markers and commands ────────────────────────────────────────────────────

/// Heading of the analysis section appended to every issue body.
pub const ANALYSIS_MARKER: &str = "二、缺陷分析结构反馈";

/// Found only in the bot's first comment on an issue.
pub const NOTICE_MARKER: &str = "issue处理注意事项";

/// Identifies an analysis comment.
pub const INFLUENCE_MARKER: &str = "影响性分析说明";

pub const CMD_CHECK: &str = "/check-issue";
pub const CMD_REASON: &str = "/reason";

pub const LABEL_PREFIX: &str = "DEFECT/";
pub const UNAFFECTED_LABEL: &str = "DEFECT/UNAFFECTED";
pub const FIXED_LABEL: &str = "DEFECT/FIXED";
pub const UNFIXED_LABEL: &str = "DEFECT/UNFIXED";

const MANUAL_LINK: &str = "https://gitee.com/Coopermassaki/cve-manager/blob/master/cve-vulner-manager/doc/md/defect-manager-manual.md";
const PR_ISSUE_LINK: &str = "https://gitee.com/help/articles/4142";

fn mention(user: &str) -> String { format!("@{user}") }

// ─── Issue body ──────────────────────────────────────────────────────────────

/// `body` with the empty analysis section appended, one line per maintained
/// version in both tables.
pub fn analysis_feedback(body: &str, maintain_version: &[String]) -> String {
  let versions: String = maintain_version.iter().map(|v| format!("{v}\n")).collect();
  format!(
    "{body}
**{ANALYSIS_MARKER}**
影响性分析说明：

缺陷严重等级:(Critical/High/Moderate/Low)

缺陷根因说明:

受影响版本排查(受影响/不受影响):
{versions}
修复是否涉及abi变化(是/否):
{versions}
"
  )
}

/// `body` with everything after the analysis heading replaced by the parsed
/// analysis. `None` when the body has no analysis heading.
pub fn analysis_echo(body: &str, comment: &AnalysisComment) -> Option<String> {
  let heading = format!("**{ANALYSIS_MARKER}**");
  let end = body.find(&heading)? + heading.len();

  Some(format!(
    "{}
影响性分析说明:
{}
缺陷严重等级:(Critical/High/Moderate/Low)
{}
缺陷根因说明:
{}
受影响版本排查(受影响/不受影响):
{}
修复是否涉及abi变化(是/否):
{}
",
    &body[..end],
    comment.influence,
    comment.severity_level,
    comment.root_cause,
    comment.affected.rows.join("\n"),
    comment.abi.rows.join("\n"),
  ))
}

// ─── Comments ────────────────────────────────────────────────────────────────

/// The first comment on an issue: handling notes, the command table and an
/// empty analysis template, addressed to every committer of the repository.
pub fn first_comment(
  repo: &str,
  maintain_version: &[String],
  committers: &[String],
) -> Result<String> {
  if committers.is_empty() {
    return Err(Error::NoCommitters(repo.to_owned()));
  }

  let versions: String = maintain_version
    .iter()
    .enumerate()
    .map(|(i, v)| format!("{}. {v}:\n", i + 1))
    .collect();
  let assignees = committers
    .iter()
    .map(|c| mention(c))
    .collect::<Vec<_>>()
    .join(" , ");

  Ok(format!(
    "
{assignees}
**{NOTICE_MARKER}:**
**1. 当前issue受影响的分支提交pr时, 须在pr描述中填写当前issue编号进行关联, 否则无法关闭当前issue;**
**2. 模板内容需要填写完整, 无论是受影响或者不受影响都需要填写完整内容,未引入的分支不需要填写, 否则无法关闭当前issue;**
**3. 以下为模板中需要填写完整的内容, 请复制到评论区回复, 注: 内容的标题名称(影响性分析说明, 缺陷严重等级, 受影响版本排查(受影响/不受影响), 修复是否涉及abi变化(是/否))不能省略,省略后defect-manager将无法正常解析填写内容.**
**评论区可能使用到的指令说明:**
| 指令  | 指令说明 | 使用权限 |
|:--:|:--:|---------|
|{CMD_CHECK}|触发defect-manager校验|不限|
|{CMD_REASON} xxx|{CMD_REASON} +挂起或取消条件|不限|
************************************************************************
影响性分析说明:

缺陷严重等级:(Critical/High/Moderate/Low)

缺陷根因说明:

受影响版本排查(受影响/不受影响):
{versions}
abi变化(是/否):
{versions}
-----------------------------------------------------------------------
缺陷issue处理具体操作请参考:
{MANUAL_LINK}
pr关联issue具体操作请参考:
{PR_ISSUE_LINK}
"
  ))
}

/// The table confirming what was read from an analysis comment.
pub fn confirmation_table(user: &str, comment: &AnalysisComment) -> String {
  let root_cause = if comment.root_cause.is_empty() {
    "无"
  } else {
    comment.root_cause.as_str()
  };

  format!(
    "
{} 经过defect-manager解析，已分析的内容如下表所示:
| 状态  | 需分析 | 内容 |
|:--:|:--:|---------|
|已分析|1.影响性分析说明|{}|
|已分析|2.缺陷严重等级|{}|
|已分析|3.缺陷根因定位|{}|
|已分析|4.受影响版本排查|{}|
|已分析|5.abi变化|{}|

**请确认分析内容的准确性，确认无误后，您可以进行后续步骤，否则您可以继续分析**
",
    mention(user),
    comment.influence.replace("\r\n", ""),
    comment.severity_level,
    root_cause,
    comment.affected.rows.join(","),
    comment.abi.rows.join(","),
  )
}

/// Posted after reopening a cancelled or suspended issue with no reason.
pub fn suspend_tip(user: &str) -> String {
  format!(
    "
{}
**issue变更为 [已取消/已挂起] 状态时，必须由操作者填写相关原因，现issue被重新打开**
**请按如下格式评论原因后，重新进行操作**
************************************************************************
{CMD_REASON} xxxxxx
",
    mention(user)
  )
}

pub fn reject_table(state: &str, user: &str, reason: &str) -> String {
  format!(
    "
| issue状态  | 操作者 | 原因 |
|:--:|:--:|---------|
|{state}|{user}|{reason}|
"
  )
}

pub fn reject_reminder(user: &str, state: &str) -> String {
  format!(
    "
{} 当前issue状态为: {state}，若要追加评论，请先修改issue状态，否则评论无法被识别.
",
    mention(user)
  )
}

/// Posted when an issue is reopened because affected branches lack a merged
/// pull request.
pub fn reopen_comment(user: &str, number: &str, branches: &[String]) -> String {
  format!(
    "
@{user}
关闭issue前,需要将受影响的分支在合并pr时关联上当前issue编号: #{number}
受影响分支: {}
具体操作参考: {PR_ISSUE_LINK}
",
    branches.join("/")
  )
}

pub fn missing_analysis(user: &str) -> String {
  format!("{} 未对受影响版本排查/abi变化进行分析，重新打开issue", mention(user))
}

// ─── Labels ──────────────────────────────────────────────────────────────────

/// The comma-joined label list with every `DEFECT/*` label removed and
/// `add` appended.
pub fn relabel<S: AsRef<str>>(labels: &[S], add: Option<&str>) -> String {
  labels
    .iter()
    .map(AsRef::<str>::as_ref)
    .filter(|l| !l.starts_with(LABEL_PREFIX))
    .chain(add)
    .collect::<Vec<_>>()
    .join(",")
}
