//! Captured-shape HTML for offline parser and pipeline tests.

/// `/sise/` with KOSPI and KOSDAQ; the KOSPI200 block is absent.
pub const INDEX_PAGE: &str = r#"
<html><body><div id="contentarea">
  <div class="box_top_sub">
    <div class="lft">
      <ul>
        <li><a href="/sise/sise_index.naver?code=KOSPI">
          <span class="tit">코스피</span>
          <span id="KOSPI_now" class="num num2">2,500.00</span>
          <span id="KOSPI_change" class="num_s num_s2">10.50 +0.42%<span class="blind">상승</span></span>
        </a></li>
        <li><a href="/sise/sise_index.naver?code=KOSDAQ">
          <span class="tit">코스닥</span>
          <span id="KOSDAQ_now" class="num num3">850.00</span>
          <span id="KOSDAQ_change" class="num_s num_s3">5.20 -0.61%<span class="blind">하락</span></span>
        </a></li>
      </ul>
    </div>
  </div>
</div></body></html>
"#;

/// `/sise/sise_rise.naver` with two risers, a separator row, and one row whose
/// change column is blank.
pub const RISE_PAGE: &str = r#"
<html><body>
<table class="type_2" summary="상승 종목">
  <tr><th>N</th><th>종목명</th><th>현재가</th><th>전일비</th><th>등락률</th></tr>
  <tr><td class="blank_08" colspan="12"></td></tr>
  <tr>
    <td class="no">1</td>
    <td><a href="/item/main.naver?code=000660" class="tltle">SK하이닉스</a></td>
    <td class="number">142,000</td>
    <td class="number"><img src="ico_up.gif" alt="상승"><span class="tah p11 red02">6,500</span></td>
    <td class="number"><span class="tah p11 red01">+4.80%</span></td>
  </tr>
  <tr>
    <td class="no">2</td>
    <td><a href="/item/main.naver?code=005380" class="tltle">현대차</a></td>
    <td class="number">185,000</td>
    <td class="number"><img src="ico_up.gif" alt="상승"><span class="tah p11 red02">6,900</span></td>
    <td class="number"><span class="tah p11 red01">+3.90%</span></td>
  </tr>
  <tr>
    <td class="no">3</td>
    <td><a href="/item/main.naver?code=999999" class="tltle">거래정지</a></td>
    <td class="number">0</td>
    <td class="number"></td>
    <td class="number"><span class="tah p11"></span></td>
  </tr>
  <tr><td class="division_line" colspan="12"></td></tr>
</table>
</body></html>
"#;

/// `/sise/sise_fall.naver` with two fallers.
pub const FALL_PAGE: &str = r#"
<html><body>
<table class="type_2">
  <tr><th>N</th><th>종목명</th><th>현재가</th><th>전일비</th><th>등락률</th></tr>
  <tr>
    <td class="no">1</td>
    <td><a href="/item/main.naver?code=373220" class="tltle">LG에너지솔루션</a></td>
    <td class="number">420,000</td>
    <td class="number"><span class="tah p11 nv01">15,000</span></td>
    <td class="number"><span class="tah p11 nv01">-3.45%</span></td>
  </tr>
  <tr>
    <td class="no">2</td>
    <td><a href="/item/main.naver?code=005490" class="tltle">POSCO홀딩스</a></td>
    <td class="number">385,000</td>
    <td class="number"><span class="tah p11 nv01">9,500</span></td>
    <td class="number"><span class="tah p11 nv01">-2.41%</span></td>
  </tr>
</table>
</body></html>
"#;

/// `/news/mainnews.naver` with three items, one duplicate headline, and one
/// item without a link.
pub const NEWS_PAGE: &str = r#"
<html><body>
<div class="mainNewsList">
  <ul class="newsList">
    <li class="block1">
      <dl>
        <dt class="thumb"><a href="/news/news_read.naver?article_id=1"><img src="t.jpg"></a></dt>
        <dd class="articleSubject"><a href="/news/news_read.naver?article_id=1&office_id=001">코스피, 외국인 매수에 상승 마감</a></dd>
        <dd class="articleSummary">
          외국인 투자자들의 순매수에 힘입어 상승
          <span class="press">연합뉴스</span><span class="bar">|</span><span class="wdate">2025-01-02 15:40:11</span>
        </dd>
      </dl>
    </li>
    <li class="block1">
      <dl>
        <dd class="articleSubject"><a href="/news/news_read.naver?article_id=2&office_id=015">반도체 업종 강세, SK하이닉스 급등</a></dd>
        <dd class="articleSummary">AI 수요 증가로 반도체주 강세 <span class="press">한국경제</span><span class="wdate">2025-01-02 14:10:00</span></dd>
      </dl>
    </li>
    <li class="block1">
      <dl>
        <dd class="articleSubject"><a href="/news/news_read.naver?article_id=3&office_id=001">코스피, 외국인 매수에 상승 마감</a></dd>
        <dd class="articleSummary">중복 기사 <span class="press">연합뉴스</span></dd>
      </dl>
    </li>
    <li class="block1">
      <dl>
        <dd class="articleSummary">제목 없는 항목</dd>
      </dl>
    </li>
  </ul>
</div>
</body></html>
"#;

/// A page whose layout no longer matches any selector.
pub const CHANGED_LAYOUT_PAGE: &str = r#"
<html><body><main><section class="redesign"><p>새로운 레이아웃</p></section></main></body></html>
"#;
